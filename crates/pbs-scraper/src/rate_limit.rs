//! Retry and pacing utilities shared by every source collector.
//!
//! [`retry_with_backoff`] handles transient HTTP failures (429 and network
//! errors) with exponential backoff. [`PolitenessDelay`] spaces consecutive
//! requests to the same site by a random interval.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Only [`ScraperError::RateLimited`] and [`ScraperError::Http`] qualify;
/// 404s, other statuses and parse failures would fail the same way again.
fn is_retriable(err: &ScraperError) -> bool {
    matches!(
        err,
        ScraperError::RateLimited { .. } | ScraperError::Http(_)
    )
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// The wait before retry `n` (1-based) is `backoff_base_secs * 2^(n-1)`
/// seconds, or the server's `Retry-After` when that is longer. With
/// `max_retries = 3` the operation runs at most 4 times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let mut delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        if let ScraperError::RateLimited {
            retry_after_secs, ..
        } = &err
        {
            if backoff_base_secs > 0 {
                delay_secs = delay_secs.max(*retry_after_secs);
            }
        }
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}

/// Random pause between consecutive network operations against one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    min_ms: u64,
    max_ms: u64,
}

impl PolitenessDelay {
    /// Bounds are reordered if given inverted.
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// No waiting at all; used by tests and cache replays.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Pick a delay uniformly within `[min_ms, max_ms]`.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let span = self.max_ms - self.min_ms;
        if span == 0 {
            return Duration::from_millis(self.min_ms);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let offset = (rand::random::<f64>() * (span as f64 + 1.0)) as u64;
        Duration::from_millis(self.min_ms + offset.min(span))
    }

    pub async fn wait(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis(), "politeness delay");
            tokio::time::sleep(delay).await;
        }
    }
}
