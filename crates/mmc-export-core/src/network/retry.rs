//! Bounded retries for transient provider failures.
//!
//! Backoff doubles from `base_delay` up to `max_delay`. With jitter on, each
//! wait is scaled by a random factor in `0.5..1.5`. A rate-limited response
//! carrying `Retry-After` waits that long instead (still capped).
//!
//! Errors that [`ExportError::is_retryable`] rejects are returned at once.

use crate::config::NetworkConfig;
use crate::{ExportError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::MAX_RETRIES,
            base_delay: NetworkConfig::RETRY_BASE_DELAY,
            max_delay: NetworkConfig::RETRY_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    pub fn with_base_delay(self, base_delay: Duration) -> Self {
        Self { base_delay, ..self }
    }

    pub fn with_max_delay(self, max_delay: Duration) -> Self {
        Self { max_delay, ..self }
    }

    pub fn with_jitter(self, jitter: bool) -> Self {
        Self { jitter, ..self }
    }

    /// Wait before retry number `retry` (0 for the first retry).
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        let backoff = self
            .base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay));

        if !self.jitter {
            return backoff;
        }
        let scale: f64 = rand::rng().random_range(0.5..1.5);
        backoff.mul_f64(scale).min(self.max_delay)
    }

    fn wait_for(&self, retry: u32, error: &ExportError) -> Duration {
        if let ExportError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } = error
        {
            return Duration::from_secs(*secs).min(self.max_delay);
        }
        self.calculate_delay(retry)
    }
}

/// What a [`retry_async`] call spent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// attempts. The last error is returned alongside the stats.
pub async fn retry_async<F, Fut, T>(config: &RetryConfig, mut operation: F) -> (Result<T>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut stats = RetryStats::default();

    loop {
        stats.attempts += 1;
        let error = match operation().await {
            Ok(value) => {
                stats.success = true;
                return (Ok(value), stats);
            }
            Err(error) => error,
        };

        if !error.is_retryable() {
            return (Err(error), stats);
        }
        if stats.attempts >= config.max_attempts {
            if config.max_attempts > 1 {
                warn!("Giving up after {} attempts: {}", stats.attempts, error);
            }
            return (Err(error), stats);
        }

        let wait = config.wait_for(stats.attempts - 1, &error);
        debug!(
            "Attempt {} of {} failed ({}), next try in {:?}",
            stats.attempts, config.max_attempts, error, wait
        );
        stats.total_delay += wait;
        tokio::time::sleep(wait).await;
    }
}
