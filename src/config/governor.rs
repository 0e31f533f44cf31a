//! Connection governor limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied by the connection governor.
///
/// All durations are stored as milliseconds so the struct round-trips through
/// JSON and environment variables unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Length of the sliding rate window.
    pub rate_window_ms: u64,
    /// Maximum admitted requests inside one rate window.
    pub max_requests_per_window: usize,
    /// Consecutive errors that open the circuit breaker.
    pub max_consecutive_errors: u32,
    /// An error older than this restarts the consecutive-error streak.
    pub error_window_ms: u64,
    /// How long the breaker stays open before admitting again.
    pub breaker_timeout_ms: u64,
    /// Backoff delay after the first error.
    pub backoff_base_ms: u64,
    /// Upper bound for the backoff delay.
    pub backoff_max_ms: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            rate_window_ms: 1_000,
            max_requests_per_window: 10,
            max_consecutive_errors: 5,
            error_window_ms: 60_000,
            breaker_timeout_ms: 30_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
        }
    }
}

impl GovernorConfig {
    /// Validate governor limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_window_ms == 0 {
            return Err("rate_window_ms must be greater than 0".into());
        }
        if self.max_requests_per_window == 0 {
            return Err("max_requests_per_window must be greater than 0".into());
        }
        if self.max_consecutive_errors == 0 {
            return Err("max_consecutive_errors must be greater than 0".into());
        }
        if self.breaker_timeout_ms == 0 {
            return Err("breaker_timeout_ms must be greater than 0".into());
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err("backoff_max_ms must not be below backoff_base_ms".into());
        }
        Ok(())
    }

    /// Rate window as a duration.
    pub const fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    /// Error-tracking window as a duration.
    pub const fn error_window(&self) -> Duration {
        Duration::from_millis(self.error_window_ms)
    }

    /// Breaker cooldown as a duration.
    pub const fn breaker_timeout(&self) -> Duration {
        Duration::from_millis(self.breaker_timeout_ms)
    }

    /// Backoff base as a duration.
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Backoff cap as a duration.
    pub const fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}
