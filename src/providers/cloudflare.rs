//! Cloudflare API v4 record provider.

use super::RecordProvider;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com";

/// TTL value Cloudflare interprets as "automatic".
const AUTOMATIC_TTL: u32 = 1;

/// Cloudflare record provider.
pub struct CloudflareProvider {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<CloudflareError>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    proxied: bool,
    #[serde(default = "automatic_ttl")]
    ttl: u32,
}

fn automatic_ttl() -> u32 {
    AUTOMATIC_TTL
}

#[derive(Debug, Serialize)]
struct RecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// Record type that holds `ip`.
fn record_type_for(ip: &str) -> Result<&'static str> {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => Ok("A"),
        Ok(IpAddr::V6(_)) => Ok("AAAA"),
        Err(_) => Err(DdnsError::InvalidIp(ip.to_string())),
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider.
    pub fn new(api_token: String) -> Self {
        Self::with_base_url(api_token, DEFAULT_BASE_URL.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(api_token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token,
            base_url,
        }
    }

    fn error(&self, message: impl Into<String>) -> DdnsError {
        DdnsError::provider(self.name(), message)
    }

    /// Prefix a failed write with what was being attempted.
    fn annotate(&self, error: DdnsError, context: String) -> DdnsError {
        let detail = match error {
            DdnsError::Provider { message, .. } => message,
            other => other.to_string(),
        };
        self.error(format!("{}: {}", context, detail))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/client/v4{}", self.base_url, path)
    }

    /// Send an authenticated request and unwrap Cloudflare's response envelope.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Option<T>> {
        let response = request.bearer_auth(&self.api_token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: CloudflareResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(self.error(format!("HTTP {} from Cloudflare API", status)))
            }
        };

        if !envelope.success {
            let msg = envelope
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| format!("Unknown error (HTTP {})", status));
            return Err(self.error(msg));
        }

        Ok(envelope.result)
    }

    /// Get the zone ID for a domain.
    async fn zone_id(&self, domain: &str) -> Result<String> {
        let request = self
            .client
            .get(self.url("/zones"))
            .query(&[("name", domain)]);

        let zones: Vec<Zone> = self.send(request).await?.unwrap_or_default();
        zones.into_iter().next().map(|z| z.id).ok_or_else(|| {
            self.error(format!("unable to retrieve zone ID for domain '{}'", domain))
        })
    }

    /// Find the record called `record` with the given type, if any.
    async fn find_record(
        &self,
        zone_id: &str,
        record: &str,
        record_type: &str,
    ) -> Result<Option<DnsRecord>> {
        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .query(&[("name", record), ("type", record_type)]);

        let records: Vec<DnsRecord> = self.send(request).await?.unwrap_or_default();
        for r in &records {
            tracing::debug!("Examining DNS record ID '{}' of type {}", r.id, r.record_type);
        }
        Ok(records.into_iter().find(|r| r.record_type == record_type))
    }
}

#[async_trait]
impl RecordProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn get(&self, domain: &str, record: &str) -> Result<String> {
        let zone_id = self.zone_id(domain).await?;

        // A dual-stack name is read through its A record.
        for record_type in ["A", "AAAA"] {
            if let Some(found) = self.find_record(&zone_id, record, record_type).await? {
                return Ok(found.content);
            }
        }
        Ok(String::new())
    }

    async fn update(&self, domain: &str, record: &str, ip: &str) -> Result<()> {
        let record_type = record_type_for(ip)?;
        let zone_id = self.zone_id(domain).await?;

        match self.find_record(&zone_id, record, record_type).await? {
            Some(existing) if existing.content == ip => {
                tracing::info!("DNS record '{}' is already set to IP '{}'", record, ip);
                Ok(())
            }
            Some(existing) => {
                let body = RecordRequest {
                    record_type,
                    name: record,
                    content: ip,
                    ttl: existing.ttl,
                    proxied: existing.proxied,
                };
                let request = self
                    .client
                    .put(self.url(&format!("/zones/{}/dns_records/{}", zone_id, existing.id)))
                    .json(&body);
                self.send::<serde_json::Value>(request).await.map_err(|e| {
                    self.annotate(
                        e,
                        format!("failed to update DNS record '{}' to IP address '{}'", record, ip),
                    )
                })?;
                tracing::info!("Successfully updated DNS record '{}' to point to '{}'", record, ip);
                Ok(())
            }
            None => {
                tracing::info!("No DNS record '{}' found for domain '{}', creating now", record, domain);
                let body = RecordRequest {
                    record_type,
                    name: record,
                    content: ip,
                    ttl: AUTOMATIC_TTL,
                    proxied: false,
                };
                let request = self
                    .client
                    .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
                    .json(&body);
                self.send::<serde_json::Value>(request).await.map_err(|e| {
                    self.annotate(
                        e,
                        format!("failed to create DNS record '{}' on domain '{}'", record, domain),
                    )
                })?;
                tracing::info!("Created DNS record '{}' pointing to '{}'", record, ip);
                Ok(())
            }
        }
    }
}
