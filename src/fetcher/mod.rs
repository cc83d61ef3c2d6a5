pub mod http_fetcher;

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::app::Result;

pub use http_fetcher::HttpFetcher;

/// Timeout and retry budget applied to every GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    /// Extra attempts after the first one fails.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl FetchPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep before retrying after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

#[async_trait]
pub trait Fetcher {
    /// GET `url` and return the body of the first 2xx response.
    async fn get(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Render a URL for logs with its query string (credentials) removed.
pub fn redact(url: &Url) -> String {
    let mut safe = url.clone();
    safe.set_query(None);
    safe.to_string()
}
