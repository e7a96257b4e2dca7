//! HTTP client for catalogue pages.
//!
//! Every request is preceded by a fixed pause so the catalogue server sees a
//! steady, polite request rate. Transient failures are retried with
//! exponential backoff on top of that pause.

use super::config::HarvestConfig;
use super::error::HarvestError;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for a single backoff pause.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Something that can turn a URL into page markup.
///
/// The pipeline only ever talks to this trait, so tests can serve fixture
/// pages without a network.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, HarvestError>;
}

/// Fetch settings, split out of [`HarvestConfig`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Pause applied before every attempt
    pub request_delay: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl From<&HarvestConfig> for FetchConfig {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            request_delay: config.request_delay(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            request_timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&HarvestConfig::default())
    }
}

/// Page fetcher with a fixed inter-request delay.
pub struct RateLimitedFetcher {
    client: Client,
    config: FetchConfig,
}

impl RateLimitedFetcher {
    /// Creates a fetcher with custom settings.
    pub fn with_config(config: FetchConfig) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HarvestError::Network {
                url: String::new(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Issues one GET, treating non-success statuses as errors.
    async fn fetch_once(&self, url: &str) -> Result<String, HarvestError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    /// Calculates retry delay with exponential backoff and jitter.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_base_delay.as_millis() as u64;
        // Exponential backoff: base * 2^min(attempt-1, 5)
        let exponential = base * 2u64.pow(attempt.saturating_sub(1).min(5));
        let capped = exponential.min(MAX_BACKOFF.as_millis() as u64);
        // Add jitter: 0-20% of the delay
        let jitter = rand::thread_rng().gen_range(0..=(capped / 5));
        Duration::from_millis(capped + jitter)
    }
}

impl PageFetcher for RateLimitedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, HarvestError> {
        let mut attempt = 0u32;

        loop {
            tokio::time::sleep(self.config.request_delay).await;
            debug!(url = %url, attempt = attempt, "Fetching page");

            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        url = %url,
                        error = %e,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
