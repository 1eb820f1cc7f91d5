//! DNS record providers.

mod cloudflare;


pub use cloudflare::CloudflareProvider;

use crate::error::Result;
use async_trait::async_trait;

/// Read and write access to one address record at a DNS provider.
///
/// Every error is treated by the daemon as retryable. Implementations only
/// need to make failures distinguishable by message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Current IP of `record` in `domain`, or an empty string if there is no
    /// such record yet.
    async fn get(&self, domain: &str, record: &str) -> Result<String>;

    /// Point `record` at `ip`, creating it if needed.
    ///
    /// Calling this again with the same `ip` is a successful no-op.
    async fn update(&self, domain: &str, record: &str, ip: &str) -> Result<()>;
}

/// Create the Cloudflare provider for an API token.
///
/// The token may reference an environment variable as `$NAME`.
pub fn create_provider(api_token: &str) -> Box<dyn RecordProvider> {
    Box::new(CloudflareProvider::new(resolve_env(api_token)))
}

/// Resolve environment variable references (values starting with $).
fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}
