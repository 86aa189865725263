//! Retry policy for page requests

use crate::config::RetryConfig;
use crate::FetchError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempt budget and delays for a single page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first
    pub max_attempts: u32,

    /// Backoff delay after the first failed attempt
    pub base_delay: Duration,

    /// Delay enforced before every attempt
    pub min_request_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            min_request_delay: config.min_request_delay(),
        }
    }

    /// Exponential backoff for a zero-based attempt index: `base * 2^attempt`
    ///
    /// Saturates instead of overflowing for large attempt counts.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        match 1u32.checked_shl(attempt) {
            Some(factor) => self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX),
            None => Duration::MAX,
        }
    }

    /// How long to wait after `error` on the given attempt before trying again
    ///
    /// Throttling and server errors back off exponentially; transport and decode
    /// failures wait the fixed base delay.
    pub fn delay_after(&self, error: &FetchError, attempt: u32) -> Duration {
        if error.uses_backoff() {
            self.backoff_delay(attempt)
        } else {
            self.base_delay
        }
    }

    /// Returns true if another attempt follows the given zero-based attempt
    pub fn has_attempt_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Sleeps unless the token fires first; returns false when cancelled
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
