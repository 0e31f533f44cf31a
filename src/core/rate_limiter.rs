//! Sliding-window admission control.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bounds the number of admitted requests inside a sliding time window.
///
/// Timestamps are appended in arrival order and pruned from the front once
/// they are older than the window, so the deque stays sorted.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    limit: usize,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per `window`.
    pub fn new(window: Duration, limit: usize) -> Self {
        Self {
            window,
            limit,
            timestamps: VecDeque::with_capacity(limit.min(1024)),
        }
    }

    /// Drop timestamps that have aged out of the window.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether another request fits in the window at `now`.
    pub fn has_capacity(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.timestamps.len() < self.limit
    }

    /// Record an admitted request.
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    /// Requests currently counted against the window.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.timestamps.len()
    }

    /// Time until the oldest request leaves the window.
    pub fn time_until_slot(&self, now: Instant) -> Duration {
        self.timestamps.front().map_or(Duration::ZERO, |&oldest| {
            self.window
                .saturating_sub(now.saturating_duration_since(oldest))
        })
    }

    /// Forget all recorded requests.
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}
