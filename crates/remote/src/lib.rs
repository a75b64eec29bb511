//! bindex remote capabilities.
//!
//! The pipeline depends only on [`KeyEnricher`] and [`DocumentSubmitter`]; the HTTP
//! implementations here talk to the alpha key service and the search engine's bulk API.

#![forbid(unsafe_code)]

use std::time::Duration;

use bindex_core::{EnrichmentKey, Result};

pub mod bulk;
mod enrich;
mod submit;

pub use bulk::{BulkItem, BulkPayload, BulkResponse};
pub use enrich::{HttpEnricher, PLACEHOLDER_NAME};
pub use submit::HttpSubmitter;

/// Bulk key enrichment: one key per name, in request order.
#[async_trait::async_trait]
pub trait KeyEnricher: Send + Sync {
    /// Empty names are placeholders; they still occupy a slot in the result.
    async fn enrich(&self, names: &[String]) -> Result<Vec<EnrichmentKey>>;
}

/// Bulk document submission.
#[async_trait::async_trait]
pub trait DocumentSubmitter: Send + Sync {
    /// Send `payload` and return the raw response body on success.
    /// `audit_trail` is never sent; it is recorded in a diagnostic sink when the call fails.
    async fn submit(&self, payload: Vec<u8>, audit_trail: &str) -> Result<Vec<u8>>;
}

/// Retry schedule for transport failures. Status and decode failures are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::none() }
}

impl RetryPolicy {
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    pub fn none() -> Self {
        Self { max_retries: 0, base_delay: Duration::from_millis(200) }
    }

    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// Delay before retry number `attempt` (0-based): doubles each time, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(Self::MAX_DELAY)
    }
}

/// Send a request built by `build`, retrying transport errors per `policy`.
pub(crate) async fn send_with_retry<F>(
    policy: RetryPolicy,
    what: &'static str,
    build: F,
) -> std::result::Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0u32;
    loop {
        match build().send().await {
            Ok(resp) => return Ok(resp),
            Err(e) if attempt < policy.max_retries => {
                let wait = policy.delay(attempt);
                tracing::warn!(call = what, attempt = attempt + 1, wait_ms = wait.as_millis() as u64, error = %e, "transport error; retrying");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Build the shared HTTP client with a request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_and_caps() {
        let p = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(p.delay(0), Duration::from_millis(100));
        assert_eq!(p.delay(1), Duration::from_millis(200));
        assert_eq!(p.delay(3), Duration::from_millis(800));
        assert_eq!(p.delay(40), RetryPolicy::MAX_DELAY);
    }

    #[test]
    fn default_policy_does_not_retry() {
        assert_eq!(RetryPolicy::default().max_retries, 0);
    }
}
