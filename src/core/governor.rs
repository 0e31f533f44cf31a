//! Connection governor: rate limiter, circuit breaker and backoff behind
//! one admission API.
//!
//! All admission state lives in a single `parking_lot::Mutex`, so the
//! read-prune-write sequence of an admission check is one critical section
//! even under a multi-threaded runtime. Create one governor per protected
//! dependency and share it through an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::GovernorConfig;
use crate::core::backoff::BackoffCalculator;
use crate::core::circuit_breaker::{BreakerCheck, CircuitBreaker};
use crate::core::event_logger::EventLogger;
use crate::core::job::LogLevel;
use crate::core::rate_limiter::RateLimiter;
use crate::core::{AdmissionDenied, DenialReason};
use crate::util::clock::{Clock, SystemClock};

const CATEGORY: &str = "governor";

/// Observability snapshot of the governor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorStatus {
    /// Breaker open flag.
    pub open: bool,
    /// Current consecutive-error streak.
    pub consecutive_errors: u32,
    /// Admitted requests inside the current rate window.
    pub requests_in_window: usize,
    /// Cooldown left before the breaker recloses, in milliseconds.
    pub remaining_open_ms: u64,
}

#[derive(Debug)]
struct AdmissionState {
    limiter: RateLimiter,
    breaker: CircuitBreaker,
}

/// Decides whether a downstream call may proceed and adapts to outcomes.
pub struct ConnectionGovernor {
    config: GovernorConfig,
    backoff: BackoffCalculator,
    clock: Arc<dyn Clock>,
    logger: EventLogger,
    state: Mutex<AdmissionState>,
}

impl std::fmt::Debug for ConnectionGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGovernor")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ConnectionGovernor {
    /// Governor on the system clock.
    pub fn new(config: GovernorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Governor on an injected clock.
    pub fn with_clock(config: GovernorConfig, clock: Arc<dyn Clock>) -> Self {
        let state = AdmissionState {
            limiter: RateLimiter::new(config.rate_window(), config.max_requests_per_window),
            breaker: CircuitBreaker::new(
                config.max_consecutive_errors,
                config.breaker_timeout(),
                config.error_window(),
            ),
        };
        Self {
            backoff: BackoffCalculator::new(config.backoff_base(), config.backoff_max()),
            config,
            clock,
            logger: EventLogger::new("governor"),
            state: Mutex::new(state),
        }
    }

    /// Route breaker transitions through `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: EventLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Limits in effect.
    pub const fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Whether a new downstream call may proceed now. Does not count the
    /// call; follow with [`Self::record_admitted_request`] when proceeding.
    pub fn try_admit(&self) -> bool {
        self.check(false).is_ok()
    }

    /// Count an admitted call against the rate window.
    pub fn record_admitted_request(&self) {
        let now = self.clock.now();
        self.state.lock().limiter.record(now);
    }

    /// Check and count in one critical section.
    pub fn admit(&self) -> Result<(), AdmissionDenied> {
        self.check(true)
    }

    fn check(&self, record: bool) -> Result<(), AdmissionDenied> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let outcome = match state.breaker.check(now) {
            BreakerCheck::Open { remaining } => Err(AdmissionDenied {
                reason: DenialReason::BreakerOpen,
                retry_after: remaining,
            }),
            BreakerCheck::Reclosed => Ok(true),
            BreakerCheck::Closed => {
                if state.limiter.has_capacity(now) {
                    Ok(false)
                } else {
                    Err(AdmissionDenied {
                        reason: DenialReason::RateLimited,
                        retry_after: state.limiter.time_until_slot(now),
                    })
                }
            }
        };
        if record && outcome.is_ok() {
            state.limiter.record(now);
        }
        drop(state);

        match outcome {
            Ok(reclosed) => {
                if reclosed {
                    self.logger.emit(
                        LogLevel::Info,
                        CATEGORY,
                        "breaker_closed",
                        None,
                        "circuit breaker closed after cooldown",
                        None,
                    );
                }
                Ok(())
            }
            Err(denied) => {
                tracing::debug!(
                    reason = %denied.reason,
                    retry_after = ?denied.retry_after,
                    "admission denied"
                );
                Err(denied)
            }
        }
    }

    /// Clear the consecutive-error streak.
    pub fn record_success(&self) {
        self.state.lock().breaker.record_success();
    }

    /// Extend the error streak, opening the breaker at the threshold.
    /// Returns whether the breaker is open after this error.
    pub fn record_error(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let tripped = state.breaker.record_error(now);
        let open = state.breaker.is_open();
        let streak = state.breaker.consecutive_errors();
        drop(state);

        if tripped {
            self.logger.emit(
                LogLevel::Warning,
                CATEGORY,
                "breaker_opened",
                None,
                "circuit breaker opened after consecutive errors",
                Some(&json!({
                    "consecutive_errors": streak,
                    "cooldown_ms": self.config.breaker_timeout_ms,
                })),
            );
        }
        open
    }

    /// Feed a call outcome back. `error_info` is logged on failure.
    /// Returns whether the breaker is open afterwards.
    pub fn record_outcome(&self, success: bool, error_info: Option<&str>) -> bool {
        if success {
            self.record_success();
            return self.state.lock().breaker.is_open();
        }
        let open = self.record_error();
        self.logger.emit(
            LogLevel::Debug,
            CATEGORY,
            "downstream_error",
            None,
            error_info.unwrap_or("downstream call failed"),
            None,
        );
        open
    }

    /// Backoff for the current streak.
    pub fn backoff_delay(&self) -> Duration {
        let streak = self.state.lock().breaker.consecutive_errors();
        self.backoff.delay(streak)
    }

    /// Snapshot for observability. Prunes the rate window; never recloses
    /// the breaker.
    pub fn status(&self) -> GovernorStatus {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let remaining = state.breaker.remaining_open(now);
        GovernorStatus {
            open: state.breaker.is_open(),
            consecutive_errors: state.breaker.consecutive_errors(),
            requests_in_window: state.limiter.in_window(now),
            remaining_open_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Close the breaker and clear all counters.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.breaker.reset();
        state.limiter.clear();
        drop(state);
        tracing::info!("governor reset");
    }
}
