//! Error types for governed calls, job tracking, and the record store.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the governor refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The rate window is full.
    RateLimited,
    /// The circuit breaker is open.
    BreakerOpen,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::BreakerOpen => write!(f, "circuit breaker open"),
        }
    }
}

/// Admission was refused; the caller should back off and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("admission denied: {reason} (retry after {retry_after:?})")]
pub struct AdmissionDenied {
    /// Which gate refused the call.
    pub reason: DenialReason,
    /// Earliest point at which a retry can succeed.
    pub retry_after: Duration,
}

/// Failures of the durable record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A dependent write referenced a job that does not exist.
    #[error("job {0} does not exist")]
    MissingJob(String),
    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Local I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to callers of the job subsystem.
#[derive(Debug, Error)]
pub enum JobError {
    /// Rate-limited or breaker-open; retryable.
    #[error(transparent)]
    AdmissionDenied(#[from] AdmissionDenied),
    /// The protected operation exceeded its deadline; retryable.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    /// The protected operation itself failed.
    #[error("downstream failure: {0}")]
    Downstream(String),
    /// No job with this process id.
    #[error("job not found: {0}")]
    NotFound(String),
    /// The caller does not own the job.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The record store failed on a read path.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Configuration rejected at build time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl JobError {
    /// Whether retrying the same call later can succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AdmissionDenied(_) | Self::Timeout(_) | Self::Downstream(_)
        )
    }

    /// Suggested wait before retrying, when the error carries one.
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::AdmissionDenied(denied) => Some(denied.retry_after),
            _ => None,
        }
    }
}

/// Outcome of racing an operation against a deadline.
///
/// `Failed` carries the operation's own error untouched so callers can keep
/// its classification.
#[derive(Debug)]
pub enum DeadlineError<E> {
    /// The deadline fired first.
    Timeout(Duration),
    /// The operation finished first with an error.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for DeadlineError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(after) => write!(f, "deadline of {after:?} exceeded"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for DeadlineError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout(_) => None,
            Self::Failed(e) => Some(e),
        }
    }
}

impl<E> DeadlineError<E> {
    /// True when the deadline fired.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
