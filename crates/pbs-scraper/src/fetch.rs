//! HTTP page fetching.
//!
//! [`PageFetcher`] is the seam every collector fetches through, so tests can
//! serve canned pages. [`HttpFetcher`] is the `reqwest` implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// Supplier of raw page bodies.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, ScraperError>;

    /// Fetch `url` and parse the body as JSON.
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, ScraperError> {
        let body = self.fetch_text(url).await?;
        serde_json::from_str(&body).map_err(|source| ScraperError::Deserialize {
            context: url.to_string(),
            source,
        })
    }
}

/// `reqwest`-backed fetcher with timeout, user agent and transient-error retry.
///
/// 429 and network failures are retried with exponential backoff up to
/// `max_retries` additional attempts; 404 and other statuses fail immediately.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be constructed.
    pub fn from_app_config(config: &pbs_core::AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_secs,
        )
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            let response = self
                .client
                .get(url)
                .header(
                    reqwest::header::ACCEPT,
                    "text/html,application/json;q=0.9,application/xml;q=0.8,*/*;q=0.5",
                )
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .send()
                .await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(ScraperError::RateLimited {
                    domain: domain_of(url),
                    retry_after_secs,
                });
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ScraperError::NotFound {
                    url: url.to_string(),
                });
            }

            if !status.is_success() {
                return Err(ScraperError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            Ok(response.text().await?)
        })
        .await
    }
}

fn domain_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
