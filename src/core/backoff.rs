//! Exponential backoff keyed on the consecutive-error count.

use std::time::Duration;

/// Maps a consecutive-failure count to a retry delay.
///
/// `delay(n) = base * 2^(n - 1)`, capped at `max`; `n == 0` yields no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffCalculator {
    base: Duration,
    max: Duration,
}

impl BackoffCalculator {
    /// Create a calculator with the given base and cap.
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay to wait after `consecutive_errors` failures in a row.
    pub fn delay(&self, consecutive_errors: u32) -> Duration {
        if consecutive_errors == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(consecutive_errors - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }

    /// The configured cap.
    pub const fn max(&self) -> Duration {
        self.max
    }
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_000), Duration::from_millis(30_000))
    }
}
