//! Retry delay policy.

use std::time::Duration;

/// Exponential backoff with deterministic jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Maximum retry attempts after the first failure.
    pub max_retries: u32,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds (before jitter).
    pub max_delay_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 250,
            max_delay_ms: 10_000,
        }
    }
}

impl Backoff {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Returns true if another attempt is allowed after `attempt` retries.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Returns the delay before retry number `attempt` (1-based).
    ///
    /// `base * 2^attempt`, capped at `max_delay_ms`, with up to ±25% jitter
    /// derived from the attempt number.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp_delay = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));
        let capped = exp_delay.min(self.max_delay_ms);

        let jitter_range = capped / 4;
        let jitter = if jitter_range > 0 {
            let offset = (u64::from(attempt) * 17) % (jitter_range * 2);
            offset as i64 - jitter_range as i64
        } else {
            0
        };

        Duration::from_millis((capped as i64 + jitter).max(0) as u64)
    }
}
