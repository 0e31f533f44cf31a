//! API-facing request/response models.
//!
//! The transport layer itself lives elsewhere; these types fix the shapes it
//! serializes and the mapping from [`JobError`] to response classes.

use serde::{Deserialize, Serialize};

use crate::core::{ConnectionGovernor, GovernorStatus, JobError, JobLifecycleManager, JobSnapshot};

/// Resolves the authenticated caller, if any.
pub trait IdentityProvider: Send + Sync {
    /// Owner id of the caller, `None` when unauthenticated.
    fn owner_id(&self) -> Option<String>;
}

/// Fixed identity, for system callers and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Option<String>);

impl IdentityProvider for StaticIdentity {
    fn owner_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Response class for an error. Admission denial and timeout stay distinct
/// so clients can apply different retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    /// Rate-limited or breaker open.
    TryLater,
    /// Deadline exceeded.
    TookTooLong,
    /// The protected dependency failed.
    DownstreamFailed,
    /// Unknown job.
    NotFound,
    /// Caller may not see the job.
    Forbidden,
    /// Anything else.
    Internal,
}

impl ResponseClass {
    /// Classify an error.
    pub const fn of(err: &JobError) -> Self {
        match err {
            JobError::AdmissionDenied(_) => Self::TryLater,
            JobError::Timeout(_) => Self::TookTooLong,
            JobError::Downstream(_) => Self::DownstreamFailed,
            JobError::NotFound(_) => Self::NotFound,
            JobError::Forbidden(_) => Self::Forbidden,
            JobError::Store(_) | JobError::InvalidConfig(_) => Self::Internal,
        }
    }

    /// HTTP status code conventionally used for this class.
    pub const fn http_status(self) -> u16 {
        match self {
            Self::TryLater => 429,
            Self::TookTooLong => 504,
            Self::DownstreamFailed => 502,
            Self::NotFound => 404,
            Self::Forbidden => 403,
            Self::Internal => 500,
        }
    }

    /// Whether the client should retry.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TryLater | Self::TookTooLong | Self::DownstreamFailed)
    }
}

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Response class.
    pub class: ResponseClass,
    /// Human-readable message.
    pub message: String,
    /// Retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl From<&JobError> for ErrorResponse {
    fn from(err: &JobError) -> Self {
        Self {
            class: ResponseClass::of(err),
            message: err.to_string(),
            retry_after_ms: err
                .retry_after()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// Job status body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Snapshot of the job.
    pub job: JobSnapshot,
}

/// Governor status body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorStatusResponse {
    /// Governor snapshot.
    #[serde(flatten)]
    pub status: GovernorStatus,
    /// Whether a call would be admitted right now.
    pub accepting: bool,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Breaker open flag.
    pub breaker_open: bool,
}

/// Look up a job for the calling identity.
pub async fn job_status(
    lifecycle: &JobLifecycleManager,
    identity: &dyn IdentityProvider,
    process_id: &str,
) -> Result<JobStatusResponse, ErrorResponse> {
    let owner = identity.owner_id();
    lifecycle
        .get_job_status(process_id, owner.as_deref())
        .await
        .map(|job| JobStatusResponse { job })
        .map_err(|e| ErrorResponse::from(&e))
}

/// Governor snapshot for dashboards.
pub fn governor_status(governor: &ConnectionGovernor) -> GovernorStatusResponse {
    let status = governor.status();
    // an elapsed cooldown recloses on the next admission, bypassing the window
    let accepting = if status.open {
        status.remaining_open_ms == 0
    } else {
        status.requests_in_window < governor.config().max_requests_per_window
    };
    GovernorStatusResponse { status, accepting }
}

/// Return a health payload.
pub fn health(governor: &ConnectionGovernor) -> Health {
    Health {
        ok: true,
        breaker_open: governor.status().open,
    }
}
