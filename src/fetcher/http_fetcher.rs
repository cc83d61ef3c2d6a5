use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::app::{CatalogError, Result};
use crate::fetcher::{redact, FetchPolicy, Fetcher};

const USER_AGENT: &str = concat!("catalog-mirror/", env!("CARGO_PKG_VERSION"));

/// Why a single attempt failed. Both kinds are retried.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),
}

pub struct HttpFetcher {
    client: Client,
    policy: FetchPolicy,
}

impl HttpFetcher {
    pub fn new(policy: FetchPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    async fn attempt(&self, url: &Url) -> std::result::Result<Vec<u8>, AttemptError> {
        // reqwest errors embed the full URL; drop it so credentials stay out of logs.
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transport(e.without_url()))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<Vec<u8>> {
        let target = redact(url);
        let max_attempts = self.policy.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(url).await {
                Ok(body) => {
                    tracing::debug!(url = %target, attempt, bytes = body.len(), "Fetched");
                    return Ok(body);
                }
                Err(e) => {
                    tracing::warn!(
                        url = %target,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(url = %target, max_attempts, error = %last_error, "Fetch failed after all retries");
        Err(CatalogError::FetchFailed(format!(
            "{} after {} attempts: {}",
            target, max_attempts, last_error
        )))
    }
}
