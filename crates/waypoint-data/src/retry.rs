//! Retry policies for route data loads.

use std::time::Duration;

use waypoint_core::RouteError;

/// Retry policy for transient offline failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Fixed delay before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry offline failures exactly once after `delay`.
    pub fn offline_once(delay: Duration) -> Self {
        Self {
            max_attempts: 1,
            delay,
        }
    }

    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            delay: Duration::ZERO,
        }
    }

    /// Check if a failed attempt should be retried. Only offline failures
    /// are retried.
    pub fn should_retry(&self, error: &RouteError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_offline()
    }

    /// Delay before the given retry.
    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::offline_once(Duration::from_secs(1))
    }
}
