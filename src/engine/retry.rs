//! Retry decisions and backoff timing.

use std::time::Duration;

use crate::core::work::WorkError;

const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential-backoff retry policy.
///
/// Built per task from its retry budget and base delay. A retry happens
/// only when the error says it is retryable *and* attempts remain; the
/// classification comes from the work item, not from error inspection here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Cap the backoff delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Total attempts a task may execute: the first run plus the retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Decide whether to retry after `attempts` executions have failed.
    pub fn should_retry(&self, attempts: u32, error: &WorkError) -> bool {
        error.is_retryable() && attempts <= self.max_retries
    }

    /// Backoff delay before attempt `attempts + 1`: doubles per attempt,
    /// starting at the base delay, capped at `max_delay`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}
