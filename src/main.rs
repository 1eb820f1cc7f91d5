//! flaredns - Dynamic DNS updater for Cloudflare.

use anyhow::{anyhow, Context};
use clap::Parser;
use flaredns::config::{Overrides, Settings};
use flaredns::daemon::{Daemon, DaemonConfig};
use flaredns::detector::{FixedIp, IpProvider, RetryingDetector};
use flaredns::providers::{create_provider, RecordProvider};
use flaredns::status::{StatusEvent, StatusKind, StatusStream};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long a graceful shutdown may take before the process gives up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Every option can also be set through the environment variable named after
/// it, e.g. `DOMAIN=example.com RECORD=home.example.com TOKEN=... flaredns`.
#[derive(Parser)]
#[command(name = "flaredns")]
#[command(about = "Update a Cloudflare DNS record with your public IP")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// Domain (zone) the record belongs to
    #[arg(long, env = "DOMAIN")]
    domain: Option<String>,

    /// DNS record to update, may be the domain itself or a subdomain
    #[arg(long, env = "RECORD")]
    record: Option<String>,

    /// Cloudflare API token
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Publish this IP instead of detecting the public one
    #[arg(long, env = "IP")]
    ip: Option<String>,

    /// Keep running and update the record whenever the IP changes
    #[arg(short, long, env = "DAEMON")]
    daemon: bool,

    /// Seconds between checks in daemon mode
    #[arg(long, env = "POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// Seconds to wait after a failure in daemon mode
    #[arg(long, env = "RETRY_DELAY")]
    retry_delay: Option<u64>,

    /// Log as JSON
    #[arg(long, env = "JSON")]
    json: bool,

    /// Enable debug logging and full error chains
    #[arg(short, long, env = "VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn overrides(self) -> (Option<PathBuf>, Overrides) {
        let overrides = Overrides {
            domain: self.domain,
            record: self.record,
            token: self.token,
            ip: self.ip.filter(|ip| !ip.trim().is_empty()),
            daemon: self.daemon,
            poll_interval: self.poll_interval,
            retry_delay: self.retry_delay,
            json: self.json,
            verbose: self.verbose,
        };
        (self.config, overrides)
    }
}

fn init_logging(json: bool, verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hickory_proto=warn,hickory_resolver=warn", level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let (config_path, overrides) = Cli::parse().overrides();

    let settings = match Settings::load(config_path.as_deref()) {
        Ok(file) => file.merge(overrides),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(settings.json, settings.verbose);
    let verbose = settings.verbose;

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if verbose {
                error!("{:?}", e);
            } else {
                error!("{}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let records: Arc<dyn RecordProvider> = Arc::from(create_provider(settings.token()?));
    debug!("Using {} record provider", records.name());

    let ips: Arc<dyn IpProvider> = match settings.ip.as_deref() {
        Some(ip) => Arc::new(FixedIp::new(ip).context("invalid IP override")?),
        None => Arc::new(RetryingDetector::default()),
    };

    let daemon_mode = settings.daemon;
    let daemon_config = settings.daemon_config();
    let daemon = Daemon::new(records, ips, Arc::new(settings));

    if daemon_mode {
        run_daemon(&daemon, daemon_config).await
    } else {
        daemon.update().await?;
        Ok(())
    }
}

async fn run_daemon(daemon: &Daemon, config: DaemonConfig) -> anyhow::Result<()> {
    let mut status = daemon.start(config)?;

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let signal = loop {
        tokio::select! {
            event = status.recv() => match event {
                Some(event) => report(&event),
                None => {
                    daemon.wait().await.context("daemon terminated")?;
                    return Ok(());
                }
            },
            signal = &mut shutdown => break signal?,
        }
    };

    info!("Received {}, attempting graceful shutdown", signal);
    daemon.stop();

    match tokio::time::timeout(SHUTDOWN_GRACE, drain(status, daemon)).await {
        Ok(result) => result.context("graceful shutdown failed"),
        Err(_) => Err(anyhow!(
            "graceful shutdown timed out after {} seconds",
            SHUTDOWN_GRACE.as_secs()
        )),
    }
}

/// Keep presenting events until the loop exits, then collect its result.
async fn drain(mut status: StatusStream, daemon: &Daemon) -> anyhow::Result<()> {
    while let Some(event) = status.recv().await {
        report(&event);
    }
    daemon.wait().await?;
    info!("Daemon stopped");
    Ok(())
}

fn report(event: &StatusEvent) {
    match event.kind {
        StatusKind::Info => info!("{}", event.message),
        StatusKind::Error => error!("{}", event.message),
        StatusKind::Fatal => error!("FATAL: {}", event.message),
    }
}

async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => Ok("SIGTERM"),
            _ = sigint.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}
