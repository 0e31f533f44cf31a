//! Tests for error types

use std::time::Duration;

use job_governor::core::{AdmissionDenied, DeadlineError, DenialReason, JobError, StoreError};

#[test]
fn test_admission_denied_error() {
    let err = JobError::from(AdmissionDenied {
        reason: DenialReason::RateLimited,
        retry_after: Duration::from_millis(250),
    });
    assert_eq!(format!("{}", err), "admission denied: rate limited (retry after 250ms)");
    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_millis(250)));
}

#[test]
fn test_timeout_error() {
    let err = JobError::Timeout(Duration::from_secs(2));
    assert_eq!(format!("{}", err), "operation timed out after 2s");
    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), None);
}

#[test]
fn test_lookup_errors_not_retryable() {
    assert!(!JobError::NotFound("p1".into()).is_retryable());
    assert!(!JobError::Forbidden("p1".into()).is_retryable());
}

#[test]
fn test_store_error() {
    let err = JobError::from(StoreError::Unavailable("connection refused".into()));
    assert_eq!(format!("{}", err), "store unavailable: connection refused");
    assert!(!err.is_retryable());
}

#[test]
fn test_deadline_error_display() {
    let timeout: DeadlineError<String> = DeadlineError::Timeout(Duration::from_secs(5));
    assert_eq!(format!("{}", timeout), "deadline of 5s exceeded");
    assert!(timeout.is_timeout());

    let failed: DeadlineError<String> = DeadlineError::Failed("quota exhausted".into());
    assert_eq!(format!("{}", failed), "quota exhausted");
    assert!(!failed.is_timeout());
}
