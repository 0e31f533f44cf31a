//! Tests for tokio spawner utilities and API response mapping

use std::sync::Arc;
use std::time::Duration;

use job_governor::config::GovernorConfig;
use job_governor::core::{AdmissionDenied, ConnectionGovernor, DenialReason, JobError, StoreError};
use job_governor::runtime::{governor_status, ErrorResponse, ResponseClass, Spawn, TokioSpawner};
use job_governor::util::ManualClock;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_denial_and_timeout_map_to_distinct_classes() {
    let denied = JobError::from(AdmissionDenied {
        reason: DenialReason::BreakerOpen,
        retry_after: Duration::from_secs(12),
    });
    let timeout = JobError::Timeout(Duration::from_secs(30));

    let denied_class = ResponseClass::of(&denied);
    let timeout_class = ResponseClass::of(&timeout);
    assert_eq!(denied_class, ResponseClass::TryLater);
    assert_eq!(timeout_class, ResponseClass::TookTooLong);
    assert_ne!(denied_class.http_status(), timeout_class.http_status());
    assert!(denied_class.is_retryable());
    assert!(timeout_class.is_retryable());
}

#[test]
fn test_error_response_carries_retry_hint() {
    let denied = JobError::from(AdmissionDenied {
        reason: DenialReason::RateLimited,
        retry_after: Duration::from_millis(400),
    });
    let body = ErrorResponse::from(&denied);
    assert_eq!(body.class, ResponseClass::TryLater);
    assert_eq!(body.retry_after_ms, Some(400));

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["class"], "try_later");
}

#[test]
fn test_lookup_and_internal_classes() {
    assert_eq!(ResponseClass::of(&JobError::NotFound("p".into())).http_status(), 404);
    assert_eq!(ResponseClass::of(&JobError::Forbidden("p".into())).http_status(), 403);
    assert_eq!(ResponseClass::of(&JobError::Downstream("x".into())).http_status(), 502);
    let store = JobError::from(StoreError::Unavailable("down".into()));
    assert_eq!(ResponseClass::of(&store), ResponseClass::Internal);
    assert!(!ResponseClass::Internal.is_retryable());
}

#[test]
fn test_governor_status_accepting_after_cooldown() {
    let clock = Arc::new(ManualClock::new());
    let governor = ConnectionGovernor::with_clock(GovernorConfig::default(), clock.clone());
    for _ in 0..5 {
        governor.record_error();
    }

    let tripped = governor_status(&governor);
    assert!(tripped.status.open);
    assert!(!tripped.accepting);

    clock.advance(Duration::from_secs(30));
    let cooled = governor_status(&governor);
    assert!(cooled.status.open);
    assert_eq!(cooled.status.remaining_open_ms, 0);
    assert!(cooled.accepting);
    assert!(governor.try_admit());
}

#[test]
fn test_governor_status_not_accepting_when_window_full() {
    let governor = ConnectionGovernor::new(GovernorConfig {
        max_requests_per_window: 1,
        rate_window_ms: 60_000,
        ..GovernorConfig::default()
    });
    governor.admit().unwrap();
    assert!(!governor_status(&governor).accepting);
}
