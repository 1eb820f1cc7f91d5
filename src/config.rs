//! Configuration management for flaredns.
//!
//! Values come from command-line flags, environment variables and an optional
//! TOML file, in that order of precedence. Flags and environment variables are
//! handled by the CLI layer and arrive here as [`Overrides`].

use crate::daemon::DaemonConfig;
use crate::error::{DdnsError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the default config locations.
pub const DEFAULT_CONFIG_FILENAME: &str = "flaredns.toml";

/// Merged configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Zone the record lives in, e.g. "example.com".
    pub domain: Option<String>,

    /// Full record name, e.g. "home.example.com".
    pub record: Option<String>,

    /// Cloudflare API token (or environment variable name if prefixed with $).
    pub token: Option<String>,

    /// Fixed IP to publish instead of detecting one.
    pub ip: Option<String>,

    /// Keep running and poll for changes.
    pub daemon: bool,

    /// Seconds between checks in daemon mode.
    pub poll_interval: u64,

    /// Seconds to wait after a failed step in daemon mode.
    pub retry_delay: u64,

    /// Log as JSON instead of human-readable text.
    pub json: bool,

    /// Enable debug logging.
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domain: None,
            record: None,
            token: None,
            ip: None,
            daemon: false,
            poll_interval: 10,
            retry_delay: 10,
            json: false,
            verbose: false,
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub domain: Option<String>,
    pub record: Option<String>,
    pub token: Option<String>,
    pub ip: Option<String>,
    pub daemon: bool,
    pub poll_interval: Option<u64>,
    pub retry_delay: Option<u64>,
    pub json: bool,
    pub verbose: bool,
}

/// The DNS record a daemon run manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTarget {
    pub domain: String,
    pub record: String,
}

/// Supplies the record to manage.
///
/// The daemon asks for it on every iteration. A failure here is treated as a
/// deployment error and ends the run.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigProvider: Send + Sync {
    fn target(&self) -> Result<RecordTarget>;
}

impl Settings {
    /// Load configuration from `path`, or from the default locations.
    ///
    /// An explicit path must exist. When searching, a missing file yields
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(DdnsError::Config(format!(
                        "config file '{}' does not exist",
                        path.display()
                    )));
                }
                Self::load_from(path)
            }
            None => match Self::search_paths().into_iter().find(|p| p.exists()) {
                Some(found) => Self::load_from(&found),
                None => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("Using configuration from file '{}'", path.display());
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Candidate config files, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let program_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        [program_dir, dirs::config_dir(), Some(PathBuf::from("/etc"))]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(DEFAULT_CONFIG_FILENAME))
            .collect()
    }

    /// Apply flag and environment values on top of the file values.
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if overrides.domain.is_some() {
            self.domain = overrides.domain;
        }
        if overrides.record.is_some() {
            self.record = overrides.record;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if overrides.ip.is_some() {
            self.ip = overrides.ip;
        }
        if let Some(secs) = overrides.poll_interval {
            self.poll_interval = secs;
        }
        if let Some(secs) = overrides.retry_delay {
            self.retry_delay = secs;
        }
        self.daemon |= overrides.daemon;
        self.json |= overrides.json;
        self.verbose |= overrides.verbose;
        self
    }

    /// The API token, or a configuration error if none was given.
    pub fn token(&self) -> Result<&str> {
        non_empty(self.token.as_deref(), "token")
    }

    /// Intervals for daemon mode.
    pub fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig {
            poll_interval: Duration::from_secs(self.poll_interval),
            retry_delay: Duration::from_secs(self.retry_delay),
        }
    }
}

impl ConfigProvider for Settings {
    fn target(&self) -> Result<RecordTarget> {
        Ok(RecordTarget {
            domain: non_empty(self.domain.as_deref(), "domain")?.to_string(),
            record: non_empty(self.record.as_deref(), "record")?.to_string(),
        })
    }
}

fn non_empty<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DdnsError::Config(format!("{} is not set", name))),
    }
}
