//! Public IP detection.
//!
//! Detection runs in two tiers. DNS lookups against well-known resolvers are
//! tried first. Only if all of them fail are the HTTP echo services consulted.
//! Within a tier the first strategy that yields a valid address wins.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// `resolver1.opendns.com`
const OPENDNS_RESOLVER: IpAddr = IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222));
/// `ns1.google.com`
const GOOGLE_NAMESERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(216, 239, 32, 10));

/// Default number of attempts made by [`RetryingDetector`].
pub const DEFAULT_ATTEMPTS: u32 = 10;
/// Default pause between attempts made by [`RetryingDetector`].
pub const DEFAULT_ATTEMPT_DELAY: Duration = Duration::from_secs(5);

fn default_http_services() -> Vec<String> {
    vec![
        "http://whatismyip.akamai.com".to_string(),
        "https://ipecho.net/plain".to_string(),
        "https://wtfismyip.com/text".to_string(),
    ]
}

/// Returns whether `ip` is a well-formed IPv4 or IPv6 address.
pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok()
}

/// A single way of discovering the public IP.
#[async_trait]
pub trait IpLookup: Send + Sync {
    /// Short name used in warnings and errors.
    fn name(&self) -> &str;

    /// Return the public IP as reported by this strategy.
    async fn lookup(&self) -> Result<String>;
}

/// Source of the current public IP, as consumed by the daemon.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpProvider: Send + Sync {
    async fn current_ip(&self) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsQuery {
    /// The resolver answers an A query with the caller's address.
    Address,
    /// The nameserver answers a TXT query with the caller's address.
    Text,
}

/// Asks a specific DNS server for the caller's address.
pub struct DnsLookup {
    name: String,
    nameserver: IpAddr,
    hostname: String,
    query: DnsQuery,
}

impl DnsLookup {
    /// A-record lookup of `myip.opendns.com` against OpenDNS.
    pub fn opendns() -> Self {
        Self {
            name: "OpenDNS".to_string(),
            nameserver: OPENDNS_RESOLVER,
            hostname: "myip.opendns.com.".to_string(),
            query: DnsQuery::Address,
        }
    }

    /// TXT-record lookup of `o-o.myaddr.l.google.com` against Google.
    pub fn google() -> Self {
        Self {
            name: "Google DNS".to_string(),
            nameserver: GOOGLE_NAMESERVER,
            hostname: "o-o.myaddr.l.google.com.".to_string(),
            query: DnsQuery::Text,
        }
    }

    fn resolver(&self) -> TokioAsyncResolver {
        let servers = NameServerConfigGroup::from_ips_clear(&[self.nameserver], 53, true);
        let config = ResolverConfig::from_parts(None, vec![], servers);

        // Retrying is done a level up.
        let mut opts = ResolverOpts::default();
        opts.timeout = DNS_TIMEOUT;
        opts.attempts = 1;

        TokioAsyncResolver::tokio(config, opts)
    }
}

#[async_trait]
impl IpLookup for DnsLookup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self) -> Result<String> {
        let resolver = self.resolver();

        match self.query {
            DnsQuery::Address => {
                let response = resolver.ipv4_lookup(self.hostname.as_str()).await?;
                let record = single_answer(response.iter().collect(), "A record")?;
                Ok(record.0.to_string())
            }
            DnsQuery::Text => {
                let response = resolver.txt_lookup(self.hostname.as_str()).await?;
                let record = single_answer(response.iter().collect(), "TXT record")?;
                txt_address(record.txt_data())
            }
        }
    }
}

/// The only element of a DNS answer. Anything else is ambiguous.
fn single_answer<T>(records: Vec<T>, what: &str) -> Result<T> {
    let found = records.len();
    let mut records = records.into_iter();
    match (records.next(), records.next()) {
        (Some(record), None) => Ok(record),
        _ => Err(DdnsError::ip_detection(format!(
            "expected to find only 1 {}, found {}",
            what, found
        ))),
    }
}

/// The address carried by a TXT record made of exactly one string.
fn txt_address<S: AsRef<[u8]>>(strings: &[S]) -> Result<String> {
    match strings {
        [only] => Ok(String::from_utf8_lossy(only.as_ref()).into_owned()),
        _ => Err(DdnsError::ip_detection(format!(
            "expected to find only 1 TXT string, found {}",
            strings.len()
        ))),
    }
}

/// Asks an HTTP service that echoes the caller's address as plain text.
pub struct HttpLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpLookup {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl IpLookup for HttpLookup {
    fn name(&self) -> &str {
        &self.url
    }

    async fn lookup(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(DdnsError::ip_detection(format!(
                "HTTP GET '{}' failed with status {}",
                self.url,
                response.status()
            )));
        }

        let text = response.text().await?;
        let ip = text.trim();
        if !is_valid_ip(ip) {
            return Err(DdnsError::InvalidIp(format!("from '{}': {}", self.url, ip)));
        }
        Ok(ip.to_string())
    }
}

/// Outcome of a successful detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub ip: String,
    /// Failures of strategies tried before the one that succeeded.
    pub warnings: Vec<String>,
}

/// IP detector with DNS strategies and HTTP fallbacks.
pub struct IpDetector {
    dns: Vec<Box<dyn IpLookup>>,
    http: Vec<Box<dyn IpLookup>>,
}

impl IpDetector {
    /// Create a new IP detector with the default resolvers and services.
    pub fn new() -> Self {
        Self::with_services(default_http_services())
    }

    /// Default DNS strategies, custom HTTP fallback services.
    pub fn with_services(services: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        let http = services
            .into_iter()
            .map(|url| Box::new(HttpLookup::new(client.clone(), url)) as Box<dyn IpLookup>)
            .collect();

        Self::with_strategies(
            vec![Box::new(DnsLookup::opendns()), Box::new(DnsLookup::google())],
            http,
        )
    }

    pub fn with_strategies(dns: Vec<Box<dyn IpLookup>>, http: Vec<Box<dyn IpLookup>>) -> Self {
        Self { dns, http }
    }

    /// Detect the public IP, DNS first, then HTTP.
    pub async fn resolve(&self) -> Result<Detection> {
        let mut failures = Vec::new();

        let found = match first_success(&self.dns, &mut failures).await {
            Some(ip) => Some(ip),
            None => {
                tracing::warn!("Failed to retrieve IP from DNS: {:?}", failures);
                first_success(&self.http, &mut failures).await
            }
        };

        match found {
            Some(ip) => {
                if !failures.is_empty() {
                    tracing::warn!(
                        "Retrieved IP {} but ran into the following problems: {:?}",
                        ip,
                        failures
                    );
                }
                Ok(Detection {
                    ip,
                    warnings: failures,
                })
            }
            None => Err(DdnsError::IpDetection {
                message: "all DNS and HTTP strategies failed".to_string(),
                failures,
            }),
        }
    }

    /// Call [`IpDetector::resolve`] up to `max_attempts` times, sleeping
    /// `delay` after each failure.
    pub async fn resolve_with_retry(&self, max_attempts: u32, delay: Duration) -> Result<Detection> {
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.resolve().await {
                Ok(detection) => return Ok(detection),
                Err(e) => {
                    tracing::debug!("IP detection attempt {} of {} failed: {}", attempt, max_attempts, e);
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let mut failures = Vec::new();
        if let Some(e) = last_error {
            failures.push(e.to_string());
        }
        Err(DdnsError::IpDetection {
            message: format!("failed to get public IP after {} attempts", max_attempts),
            failures,
        })
    }
}

impl Default for IpDetector {
    fn default() -> Self {
        Self::new()
    }
}

async fn first_success(tier: &[Box<dyn IpLookup>], failures: &mut Vec<String>) -> Option<String> {
    for strategy in tier {
        match strategy.lookup().await {
            Ok(ip) if is_valid_ip(&ip) => {
                tracing::debug!("Detected IP {} from {}", ip, strategy.name());
                return Some(ip);
            }
            Ok(ip) => failures.push(format!("{}: IP address {:?} is malformed", strategy.name(), ip)),
            Err(e) => failures.push(format!("{}: {}", strategy.name(), e)),
        }
    }
    None
}

/// The daemon's production IP source: an [`IpDetector`] with retries.
pub struct RetryingDetector {
    detector: IpDetector,
    max_attempts: u32,
    delay: Duration,
}

impl RetryingDetector {
    pub fn new(detector: IpDetector, max_attempts: u32, delay: Duration) -> Self {
        Self {
            detector,
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryingDetector {
    fn default() -> Self {
        Self::new(IpDetector::new(), DEFAULT_ATTEMPTS, DEFAULT_ATTEMPT_DELAY)
    }
}

#[async_trait]
impl IpProvider for RetryingDetector {
    async fn current_ip(&self) -> Result<String> {
        let detection = self
            .detector
            .resolve_with_retry(self.max_attempts, self.delay)
            .await?;
        Ok(detection.ip)
    }
}

/// A configured IP that bypasses detection.
#[derive(Debug, Clone)]
pub struct FixedIp {
    ip: String,
}

impl FixedIp {
    pub fn new(ip: &str) -> Result<Self> {
        let ip = ip.trim();
        if !is_valid_ip(ip) {
            return Err(DdnsError::InvalidIp(ip.to_string()));
        }
        Ok(Self { ip: ip.to_string() })
    }
}

#[async_trait]
impl IpProvider for FixedIp {
    async fn current_ip(&self) -> Result<String> {
        Ok(self.ip.clone())
    }
}
