//! The reconciliation loop.
//!
//! A [`Daemon`] keeps one DNS record pointed at the machine's public IP. It
//! can run a single [`Daemon::update`], or poll continuously after
//! [`Daemon::start`] until [`Daemon::stop`] is called.
//!
//! Each poll compares three values: the IP the loop last wrote, the IP the
//! record currently holds, and the IP just detected. A record changed by
//! someone else is noticed on the next poll and put back, without any state
//! beyond the process lifetime.

use crate::config::{ConfigProvider, RecordTarget};
use crate::detector::IpProvider;
use crate::error::{DdnsError, Result};
use crate::providers::RecordProvider;
use crate::status::{self, StatusEvent, StatusSender, StatusStream};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const IP_STEP: &str = "unable to retrieve public IP";
const CONFIG_STEP: &str = "unable to find domain or record in configuration";
const UPDATE_STEP: &str = "failed to update DNS";

/// Intervals for a continuous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonConfig {
    /// How long to wait between checks.
    pub poll_interval: Duration,
    /// How long to wait after a failed step.
    pub retry_delay: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// Lifecycle of a [`Daemon`]. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl DaemonState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DaemonState::Idle,
            1 => DaemonState::Running,
            2 => DaemonState::Stopping,
            _ => DaemonState::Stopped,
        }
    }
}

#[derive(Debug)]
struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn new() -> Self {
        Self(AtomicU8::new(DaemonState::Idle as u8))
    }

    fn get(&self) -> DaemonState {
        DaemonState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn is_running(&self) -> bool {
        self.get() == DaemonState::Running
    }

    /// Move from `from` to `to`, returning false if the state was not `from`.
    fn transition(&self, from: DaemonState, to: DaemonState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn finish(&self) {
        self.0.store(DaemonState::Stopped as u8, Ordering::SeqCst);
    }
}

/// The IP the loop last wrote and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastUpdate {
    pub ip: String,
    pub at: DateTime<Utc>,
}

/// What the loop remembers between polls. Lost on restart.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationState {
    last: Option<LastUpdate>,
}

/// How the detected IP relates to what the loop knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Detected, remembered and published IPs all agree.
    Unchanged { since: DateTime<Utc> },
    /// Nothing has been written yet in this process.
    FirstDetection,
    /// The public IP moved.
    IpChanged { from: String },
    /// The public IP is the same but the record says otherwise.
    Drift { published: String },
}

impl ReconciliationState {
    pub fn last_known_ip(&self) -> Option<&str> {
        self.last.as_ref().map(|l| l.ip.as_str())
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last.as_ref().map(|l| l.at)
    }

    /// Compare a freshly detected IP with the remembered and published ones.
    pub fn classify(&self, detected: &str, published: &str) -> Change {
        match &self.last {
            None => Change::FirstDetection,
            Some(last) if last.ip != detected => Change::IpChanged {
                from: last.ip.clone(),
            },
            Some(_) if published != detected => Change::Drift {
                published: published.to_string(),
            },
            Some(last) => Change::Unchanged { since: last.at },
        }
    }

    /// Remember `ip` as the one the loop is now asserting.
    pub fn advance(&mut self, ip: String, at: DateTime<Utc>) {
        self.last = Some(LastUpdate { ip, at });
    }
}

impl Change {
    fn describe(&self, detected: &str) -> String {
        match self {
            Change::Unchanged { since } => format!(
                "No IP change detected since {} ({} seconds ago)",
                since.to_rfc2822(),
                (Utc::now() - *since).num_seconds()
            ),
            Change::FirstDetection => format!("Found public IP '{}'", detected),
            Change::IpChanged { from } => format!(
                "Detected new public IP address, it changed from '{}' to '{}'",
                from, detected
            ),
            Change::Drift { published } => format!(
                "Public IP address did not change, but DNS record did not match: is '{}' but expected '{}', correcting",
                published, detected
            ),
        }
    }
}

/// Keeps one DNS record in sync with the public IP.
pub struct Daemon {
    records: Arc<dyn RecordProvider>,
    ips: Arc<dyn IpProvider>,
    config: Arc<dyn ConfigProvider>,
    lifecycle: Arc<Lifecycle>,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Daemon {
    pub fn new(
        records: Arc<dyn RecordProvider>,
        ips: Arc<dyn IpProvider>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            records,
            ips,
            config,
            lifecycle: Arc::new(Lifecycle::new()),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> DaemonState {
        self.lifecycle.get()
    }

    /// Perform a single update: detect the IP and write it to the record.
    ///
    /// Errors name the step that failed.
    pub async fn update(&self) -> Result<()> {
        let ip = self.ips.current_ip().await.map_err(|e| e.at_step(IP_STEP))?;
        let RecordTarget { domain, record } = self.config.target().map_err(|e| e.at_step(CONFIG_STEP))?;

        self.records
            .update(&domain, &record, &ip)
            .await
            .map_err(|e| e.at_step(UPDATE_STEP))?;

        info!("DNS record '{}' points to '{}'", record, ip);
        Ok(())
    }

    /// Start polling on a background task.
    ///
    /// Returns the status stream of the run. It closes when the loop exits.
    /// A daemon can only be started once.
    pub fn start(&self, config: DaemonConfig) -> Result<StatusStream> {
        if !self.lifecycle.transition(DaemonState::Idle, DaemonState::Running) {
            return Err(DdnsError::Config(format!(
                "daemon cannot be started from state {:?}",
                self.state()
            )));
        }

        let (tx, stream) = status::channel(status::DEFAULT_CAPACITY);
        let reconciler = Reconciler {
            records: self.records.clone(),
            ips: self.ips.clone(),
            config: self.config.clone(),
            lifecycle: self.lifecycle.clone(),
            intervals: config,
            state: ReconciliationState::default(),
        };

        let handle = tokio::spawn(reconciler.run(tx));
        *self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        Ok(stream)
    }

    /// Ask the loop to stop once the current step finishes.
    ///
    /// Neither a sleep nor an in-flight network call is interrupted.
    pub fn stop(&self) {
        if self.lifecycle.transition(DaemonState::Running, DaemonState::Stopping) {
            info!("Stop requested, daemon will exit after the current step");
        }
    }

    /// Wait for the loop to exit.
    ///
    /// Returns the fatal error that ended the run, if there was one.
    pub async fn wait(&self) -> Result<()> {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => {
                    self.lifecycle.finish();
                    Err(DdnsError::Task(e.to_string()))
                }
            },
            None => Ok(()),
        }
    }
}

/// What to do after one iteration.
#[derive(Debug, PartialEq, Eq)]
enum Next {
    Sleep(Duration),
    Stop,
}

/// The loop body, owned by the background task.
struct Reconciler {
    records: Arc<dyn RecordProvider>,
    ips: Arc<dyn IpProvider>,
    config: Arc<dyn ConfigProvider>,
    lifecycle: Arc<Lifecycle>,
    intervals: DaemonConfig,
    state: ReconciliationState,
}

impl Reconciler {
    async fn run(mut self, status: StatusSender) -> Result<()> {
        status
            .info(format!(
                "Daemon running, will now monitor for IP updates every {} seconds",
                self.intervals.poll_interval.as_secs()
            ))
            .await;

        while self.lifecycle.is_running() {
            match self.iterate(&status).await {
                Ok(Next::Sleep(delay)) => {
                    if !self.lifecycle.is_running() {
                        break;
                    }
                    tokio::time::sleep(delay).await;
                }
                Ok(Next::Stop) => break,
                Err(e) => {
                    self.lifecycle.finish();
                    status.fatal(CONFIG_STEP, e.clone()).await;
                    return Err(e.at_step(CONFIG_STEP));
                }
            }
        }

        debug!("Daemon loop exited");
        self.lifecycle.finish();
        Ok(())
    }

    /// One poll. An `Err` is a configuration failure and ends the run.
    async fn iterate(&mut self, status: &StatusSender) -> Result<Next> {
        let RecordTarget { domain, record } = self.config.target()?;
        let retry = self.intervals.retry_delay;

        let published = match self.records.get(&domain, &record).await {
            Ok(ip) => ip,
            Err(e) => {
                status
                    .error(
                        format!(
                            "Unable to look up current DNS record '{}', will retry in {} seconds",
                            record,
                            retry.as_secs()
                        ),
                        e,
                    )
                    .await;
                return Ok(Next::Sleep(retry));
            }
        };

        let detected = match self.ips.current_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                status
                    .error(
                        format!("Unable to retrieve public IP, will retry in {} seconds", retry.as_secs()),
                        e,
                    )
                    .await;
                return Ok(Next::Sleep(retry));
            }
        };

        let change = self.state.classify(&detected, &published);
        let event = StatusEvent::info(change.describe(&detected)).with_data(json!({
            "domain": domain,
            "record": record,
            "ip": detected,
            "published": published,
        }));
        status.send(event).await;

        if let Change::Unchanged { .. } = change {
            return Ok(Next::Sleep(self.intervals.poll_interval));
        }

        // Advance before writing. If the write fails, the next poll reads the
        // old value back as drift and writes again.
        self.state.advance(detected.clone(), Utc::now());

        if let Err(e) = self.records.update(&domain, &record, &detected).await {
            status
                .error(
                    format!(
                        "Unable to update DNS record '{}' to '{}', will retry in {} seconds",
                        record,
                        detected,
                        retry.as_secs()
                    ),
                    e,
                )
                .await;
            return Ok(Next::Sleep(retry));
        }

        status
            .info(format!("DNS record '{}' now points to '{}'", record, detected))
            .await;

        if !self.lifecycle.is_running() {
            return Ok(Next::Stop);
        }
        Ok(Next::Sleep(self.intervals.poll_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockConfigProvider;
    use crate::detector::MockIpProvider;
    use crate::providers::MockRecordProvider;
    use crate::status::StatusKind;
    use async_trait::async_trait;
    use std::time::Instant;

    const DOMAIN: &str = "abc.com";
    const RECORD: &str = "xyz.abc.com";

    fn static_config() -> MockConfigProvider {
        let mut config = MockConfigProvider::new();
        config.expect_target().returning(|| {
            Ok(RecordTarget {
                domain: DOMAIN.to_string(),
                record: RECORD.to_string(),
            })
        });
        config
    }

    fn fixed_ip(ip: &'static str) -> MockIpProvider {
        let mut ips = MockIpProvider::new();
        ips.expect_current_ip().returning(move || Ok(ip.to_string()));
        ips
    }

    fn published(ip: &'static str) -> MockRecordProvider {
        let mut records = MockRecordProvider::new();
        records
            .expect_get()
            .withf(|domain, record| domain == DOMAIN && record == RECORD)
            .returning(move |_, _| Ok(ip.to_string()));
        records
    }

    fn reconciler(
        records: MockRecordProvider,
        ips: MockIpProvider,
        state: ReconciliationState,
    ) -> Reconciler {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.transition(DaemonState::Idle, DaemonState::Running);
        Reconciler {
            records: Arc::new(records),
            ips: Arc::new(ips),
            config: Arc::new(static_config()),
            lifecycle,
            intervals: DaemonConfig {
                poll_interval: Duration::from_secs(60),
                retry_delay: Duration::from_secs(5),
            },
            state,
        }
    }

    fn known(ip: &str) -> ReconciliationState {
        let mut state = ReconciliationState::default();
        state.advance(ip.to_string(), Utc::now());
        state
    }

    async fn iterate_once(reconciler: &mut Reconciler) -> (Next, Vec<StatusEvent>) {
        let (tx, stream) = status::channel(status::DEFAULT_CAPACITY);
        let next = reconciler.iterate(&tx).await.unwrap();
        drop(tx);
        (next, stream.collect().await)
    }

    #[test]
    fn test_classify() {
        let empty = ReconciliationState::default();
        assert_eq!(empty.classify("1.1.1.1", ""), Change::FirstDetection);

        let state = known("1.1.1.1");
        assert!(matches!(
            state.classify("1.1.1.1", "1.1.1.1"),
            Change::Unchanged { .. }
        ));
        assert_eq!(
            state.classify("2.2.2.2", "1.1.1.1"),
            Change::IpChanged {
                from: "1.1.1.1".to_string()
            }
        );
        assert_eq!(
            state.classify("1.1.1.1", "9.9.9.9"),
            Change::Drift {
                published: "9.9.9.9".to_string()
            }
        );
    }

    #[test]
    fn test_state_sets_ip_and_time_together() {
        let mut state = ReconciliationState::default();
        assert!(state.last_known_ip().is_none());
        assert!(state.last_update().is_none());

        state.advance("1.1.1.1".to_string(), Utc::now());
        assert_eq!(state.last_known_ip(), Some("1.1.1.1"));
        assert!(state.last_update().is_some());
    }

    #[tokio::test]
    async fn test_update() {
        let mut records = MockRecordProvider::new();
        records
            .expect_update()
            .withf(|domain, record, ip| domain == DOMAIN && record == RECORD && ip == "1.1.1.1")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let daemon = Daemon::new(
            Arc::new(records),
            Arc::new(fixed_ip("1.1.1.1")),
            Arc::new(static_config()),
        );
        daemon.update().await.unwrap();
        assert_eq!(daemon.state(), DaemonState::Idle);
    }

    #[tokio::test]
    async fn test_update_names_failed_step() {
        let mut ips = MockIpProvider::new();
        ips.expect_current_ip()
            .returning(|| Err(DdnsError::ip_detection("all strategies failed")));
        let mut records = MockRecordProvider::new();
        records.expect_update().never();

        let daemon = Daemon::new(Arc::new(records), Arc::new(ips), Arc::new(static_config()));
        let err = daemon.update().await.unwrap_err();
        assert!(matches!(err, DdnsError::Step { step: IP_STEP, .. }));

        let mut config = MockConfigProvider::new();
        config
            .expect_target()
            .returning(|| Err(DdnsError::Config("record is not set".to_string())));
        let daemon = Daemon::new(
            Arc::new(MockRecordProvider::new()),
            Arc::new(fixed_ip("1.1.1.1")),
            Arc::new(config),
        );
        let err = daemon.update().await.unwrap_err();
        assert!(matches!(err, DdnsError::Step { step: CONFIG_STEP, .. }));

        let mut records = MockRecordProvider::new();
        records
            .expect_update()
            .returning(|_, _, _| Err(DdnsError::provider("mock", "write rejected")));
        let daemon = Daemon::new(
            Arc::new(records),
            Arc::new(fixed_ip("1.1.1.1")),
            Arc::new(static_config()),
        );
        let err = daemon.update().await.unwrap_err();
        assert!(err.to_string().starts_with(UPDATE_STEP));
    }

    #[tokio::test]
    async fn test_first_iteration_writes() {
        let mut records = published("");
        records
            .expect_update()
            .withf(|_, _, ip| ip == "1.1.1.1")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut reconciler = reconciler(records, fixed_ip("1.1.1.1"), ReconciliationState::default());
        let (next, events) = iterate_once(&mut reconciler).await;

        assert_eq!(next, Next::Sleep(Duration::from_secs(60)));
        assert_eq!(events[0].message, "Found public IP '1.1.1.1'");
        assert_eq!(events[0].data.as_ref().unwrap()["record"], RECORD);
        assert_eq!(reconciler.state.last_known_ip(), Some("1.1.1.1"));
    }

    #[tokio::test]
    async fn test_unchanged_iteration_does_not_write() {
        let mut records = published("1.1.1.1");
        records.expect_update().never();

        let mut reconciler = reconciler(records, fixed_ip("1.1.1.1"), known("1.1.1.1"));
        let (next, events) = iterate_once(&mut reconciler).await;

        assert_eq!(next, Next::Sleep(Duration::from_secs(60)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StatusKind::Info);
        assert!(events[0].message.starts_with("No IP change detected since"));
    }

    #[tokio::test]
    async fn test_drift_is_corrected() {
        let mut records = published("9.9.9.9");
        records
            .expect_update()
            .withf(|domain, record, ip| domain == DOMAIN && record == RECORD && ip == "1.1.1.1")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut reconciler = reconciler(records, fixed_ip("1.1.1.1"), known("1.1.1.1"));
        let (_, events) = iterate_once(&mut reconciler).await;

        assert_eq!(events[0].kind, StatusKind::Info);
        assert!(events[0].message.contains("is '9.9.9.9' but expected '1.1.1.1'"));
        assert_eq!(reconciler.state.last_known_ip(), Some("1.1.1.1"));
    }

    #[tokio::test]
    async fn test_ip_change_is_published() {
        let mut records = published("1.1.1.1");
        records
            .expect_update()
            .withf(|_, _, ip| ip == "2.2.2.2")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut reconciler = reconciler(records, fixed_ip("2.2.2.2"), known("1.1.1.1"));
        let (_, events) = iterate_once(&mut reconciler).await;

        assert!(events[0].message.contains("changed from '1.1.1.1' to '2.2.2.2'"));
        assert_eq!(reconciler.state.last_known_ip(), Some("2.2.2.2"));
    }

    #[tokio::test]
    async fn test_lookup_failure_retries_without_advancing() {
        let mut records = MockRecordProvider::new();
        records
            .expect_get()
            .returning(|_, _| Err(DdnsError::provider("mock", "Invalid access token")));
        records.expect_update().never();
        let mut ips = MockIpProvider::new();
        ips.expect_current_ip().never();

        let mut reconciler = reconciler(records, ips, known("1.1.1.1"));
        let (next, events) = iterate_once(&mut reconciler).await;

        assert_eq!(next, Next::Sleep(Duration::from_secs(5)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StatusKind::Error);
        assert!(events[0].message.contains("will retry in 5 seconds"));
        assert!(events[0].message.contains("Invalid access token"));
        assert_eq!(reconciler.state.last_known_ip(), Some("1.1.1.1"));
    }

    #[tokio::test]
    async fn test_ip_failure_retries() {
        let mut records = published("1.1.1.1");
        records.expect_update().never();
        let mut ips = MockIpProvider::new();
        ips.expect_current_ip()
            .returning(|| Err(DdnsError::ip_detection("all strategies failed")));

        let mut reconciler = reconciler(records, ips, ReconciliationState::default());
        let (next, events) = iterate_once(&mut reconciler).await;

        assert_eq!(next, Next::Sleep(Duration::from_secs(5)));
        assert!(events[0].message.starts_with("Unable to retrieve public IP"));
        assert!(reconciler.state.last_known_ip().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_is_retried_as_drift() {
        let mut records = published("1.1.1.1");
        let mut attempts = 0;
        records
            .expect_update()
            .withf(|_, _, ip| ip == "2.2.2.2")
            .times(2)
            .returning(move |_, _, _| {
                attempts += 1;
                if attempts == 1 {
                    Err(DdnsError::provider("mock", "write rejected"))
                } else {
                    Ok(())
                }
            });

        let mut reconciler = reconciler(records, fixed_ip("2.2.2.2"), known("1.1.1.1"));

        let (next, events) = iterate_once(&mut reconciler).await;
        assert_eq!(next, Next::Sleep(Duration::from_secs(5)));
        assert_eq!(events.last().unwrap().kind, StatusKind::Error);
        assert_eq!(reconciler.state.last_known_ip(), Some("2.2.2.2"));

        let (next, events) = iterate_once(&mut reconciler).await;
        assert_eq!(next, Next::Sleep(Duration::from_secs(60)));
        assert!(events[0].message.contains("correcting"));
    }

    #[tokio::test]
    async fn test_config_failure_is_fatal() {
        let mut config = MockConfigProvider::new();
        config
            .expect_target()
            .times(1)
            .returning(|| Err(DdnsError::Config("domain is not set".to_string())));
        let mut records = MockRecordProvider::new();
        records.expect_get().never();

        let daemon = Daemon::new(Arc::new(records), Arc::new(fixed_ip("1.1.1.1")), Arc::new(config));
        let stream = daemon.start(DaemonConfig::default()).unwrap();

        let events = stream.collect().await;
        let fatal: Vec<_> = events.iter().filter(|e| e.is_fatal()).collect();
        assert_eq!(fatal.len(), 1);
        assert!(events.last().unwrap().is_fatal());
        assert!(fatal[0].message.contains("domain is not set"));

        let err = daemon.wait().await.unwrap_err();
        assert!(matches!(err, DdnsError::Step { step: CONFIG_STEP, .. }));
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut records = published("1.1.1.1");
        records.expect_update().returning(|_, _, _| Ok(()));
        let daemon = Daemon::new(Arc::new(records), Arc::new(fixed_ip("1.1.1.1")), Arc::new(static_config()));

        let _stream = daemon.start(DaemonConfig::default()).unwrap();
        assert!(daemon.start(DaemonConfig::default()).is_err());

        daemon.stop();
        assert_eq!(daemon.state(), DaemonState::Stopping);
    }

    /// Takes a while to answer, like a real lookup.
    struct SlowIp(Duration);

    #[async_trait]
    impl IpProvider for SlowIp {
        async fn current_ip(&self) -> Result<String> {
            tokio::time::sleep(self.0).await;
            Ok("1.1.1.1".to_string())
        }
    }

    #[tokio::test]
    async fn test_stop_skips_poll_sleep() {
        let mut records = published("");
        records.expect_update().returning(|_, _, _| Ok(()));

        let daemon = Daemon::new(
            Arc::new(records),
            Arc::new(SlowIp(Duration::from_millis(100))),
            Arc::new(static_config()),
        );
        let mut stream = daemon
            .start(DaemonConfig {
                poll_interval: Duration::from_secs(3600),
                retry_delay: Duration::from_secs(3600),
            })
            .unwrap();
        assert_eq!(daemon.state(), DaemonState::Running);

        // Wait for the startup announcement, the loop is now inside the lookup.
        let first = stream.recv().await.unwrap();
        assert!(first.message.starts_with("Daemon running"));

        let started = Instant::now();
        daemon.stop();
        daemon.wait().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(daemon.state(), DaemonState::Stopped);

        let rest = stream.collect().await;
        assert!(rest.iter().all(|e| !e.is_fatal()));
    }

    #[tokio::test]
    async fn test_wait_without_start() {
        let daemon = Daemon::new(
            Arc::new(MockRecordProvider::new()),
            Arc::new(MockIpProvider::new()),
            Arc::new(static_config()),
        );
        daemon.wait().await.unwrap();
        assert_eq!(daemon.state(), DaemonState::Idle);
    }
}
