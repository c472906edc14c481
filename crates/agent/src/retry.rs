//! Exponential backoff for transient provider failures.

use std::time::Duration;

use stepwise_core::error::ProviderError;

/// Longest single wait between attempts.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// How many times to try a provider call, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Always at least 1.
    pub attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never retries.
    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Whether another attempt may follow the (zero-based) `attempt` that just failed.
    pub fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        error.is_transient() && attempt + 1 < self.attempts
    }

    /// Wait before retrying after the (zero-based) `attempt`.
    ///
    /// Exponential in the attempt number. A rate limit's `retry-after` hint wins
    /// when it asks for longer.
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exponent = attempt.min(30);
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(MAX_DELAY);
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs).min(MAX_DELAY))
            }
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
