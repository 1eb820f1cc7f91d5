//! Error types for flaredns.

use thiserror::Error;

/// Result type alias for flaredns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug, Clone)]
pub enum DdnsError {
    /// Configuration error (missing or invalid domain, record, token...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider-specific error.
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// IP detection error. Carries every underlying failure.
    #[error("IP detection failed: {message}{}", render_failures(.failures))]
    IpDetection {
        message: String,
        failures: Vec<String>,
    },

    /// A string that should have been an IP address was not one.
    #[error("Invalid IP address: {0:?}")]
    InvalidIp(String),

    /// A one-shot step failed.
    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<DdnsError>,
    },

    /// The daemon task panicked or was cancelled.
    #[error("Daemon task failed: {0}")]
    Task(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DdnsError {
    /// Build an IP detection error without underlying failures.
    pub fn ip_detection(message: impl Into<String>) -> Self {
        DdnsError::IpDetection {
            message: message.into(),
            failures: Vec::new(),
        }
    }

    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        DdnsError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Annotate this error with the step that produced it.
    pub fn at_step(self, step: &'static str) -> Self {
        DdnsError::Step {
            step,
            source: Box::new(self),
        }
    }
}

fn render_failures(failures: &[String]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    format!(" [{}]", failures.join("; "))
}

impl From<std::io::Error> for DdnsError {
    fn from(e: std::io::Error) -> Self {
        DdnsError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<hickory_resolver::error::ResolveError> for DdnsError {
    fn from(e: hickory_resolver::error::ResolveError) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_detection_lists_failures() {
        let err = DdnsError::IpDetection {
            message: "all strategies failed".to_string(),
            failures: vec!["opendns: timeout".to_string(), "google: refused".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "IP detection failed: all strategies failed [opendns: timeout; google: refused]"
        );
    }

    #[test]
    fn test_step_annotation() {
        let err = DdnsError::Config("domain is not set".to_string())
            .at_step("unable to find domain or record in configuration");
        assert!(err.to_string().starts_with("unable to find domain or record"));
        assert!(err.to_string().contains("domain is not set"));
    }
}
