//! Circuit breaker driven by a consecutive-error streak.
//!
//! # States
//! - Closed: calls pass through, errors extend the streak
//! - Open: calls are refused until the cooldown elapses
//!
//! There is no tracked half-open state. The first check after the cooldown
//! closes the breaker and clears the streak; the next error or success then
//! decides whether the streak grows back toward the threshold.

use std::time::{Duration, Instant};

/// Result of checking the breaker before a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerCheck {
    /// Closed; the call may proceed subject to rate limiting.
    Closed,
    /// Was open, cooldown elapsed, now closed again. The call is admitted.
    Reclosed,
    /// Open; refuse the call.
    Open {
        /// Cooldown left before the breaker recloses.
        remaining: Duration,
    },
}

/// Consecutive-error streak plus open flag and timer.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    error_window: Duration,
    consecutive_errors: u32,
    last_error: Option<Instant>,
    // open iff Some
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub const fn new(threshold: u32, cooldown: Duration, error_window: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            error_window,
            consecutive_errors: 0,
            last_error: None,
            opened_at: None,
        }
    }

    /// Check the breaker at `now`, reclosing it if the cooldown has passed.
    pub fn check(&mut self, now: Instant) -> BreakerCheck {
        let Some(opened_at) = self.opened_at else {
            return BreakerCheck::Closed;
        };
        let open_for = now.saturating_duration_since(opened_at);
        if open_for >= self.cooldown {
            self.opened_at = None;
            self.consecutive_errors = 0;
            BreakerCheck::Reclosed
        } else {
            BreakerCheck::Open {
                remaining: self.cooldown - open_for,
            }
        }
    }

    /// Cooldown left at `now` without changing state.
    pub fn remaining_open(&self, now: Instant) -> Duration {
        self.opened_at.map_or(Duration::ZERO, |opened_at| {
            self.cooldown
                .saturating_sub(now.saturating_duration_since(opened_at))
        })
    }

    /// Clear the streak. The open flag is left alone.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Extend or restart the streak. Returns `true` only for the error that
    /// crosses the threshold and opens the breaker.
    pub fn record_error(&mut self, now: Instant) -> bool {
        let continues_streak = self
            .last_error
            .is_some_and(|last| now.saturating_duration_since(last) <= self.error_window);
        self.consecutive_errors = if continues_streak {
            self.consecutive_errors.saturating_add(1)
        } else {
            1
        };
        self.last_error = Some(now);

        if self.opened_at.is_none() && self.consecutive_errors >= self.threshold {
            self.opened_at = Some(now);
            return true;
        }
        false
    }

    /// Whether the breaker is open (ignoring an elapsed cooldown).
    pub const fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }

    /// Current streak length.
    pub const fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Close the breaker and forget the streak.
    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.last_error = None;
        self.opened_at = None;
    }
}
