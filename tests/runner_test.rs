//! Tests for governed calls, background job execution and service wiring.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use job_governor::builders::{build_service, JobService};
use job_governor::config::{GovernorConfig, ServiceConfig, StoreBackendConfig};
use job_governor::core::{
    ConnectionGovernor, DenialReason, JobError, JobLifecycleManager, JobRecord, JobStatus,
    JobStore, LogLevel, StartJob,
};
use job_governor::infra::store::{FileJobStore, InMemoryJobStore};
use job_governor::runtime::{
    governed_call, governor_status, health, job_status, JobRunner, ResponseClass, StaticIdentity,
    TokioSpawner,
};
use job_governor::util::{init_tracing, new_process_id};
use serde_json::json;

fn runner_with(config: GovernorConfig) -> JobRunner<TokioSpawner> {
    init_tracing();
    let governor = Arc::new(ConnectionGovernor::new(config));
    let lifecycle = JobLifecycleManager::new(Arc::new(InMemoryJobStore::new()));
    JobRunner::new(governor, lifecycle, TokioSpawner::current())
}

async fn wait_terminal(store: &Arc<dyn JobStore>, pid: &str) -> JobRecord {
    for _ in 0..500 {
        if let Some(record) = store.get(pid).await.unwrap() {
            if record.status.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {pid} never reached a terminal status");
}

#[tokio::test]
async fn test_governed_call_records_outcomes() {
    let governor = ConnectionGovernor::new(GovernorConfig::default());

    let value = governed_call(&governor, Duration::from_secs(1), async { Ok::<_, String>(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);

    let err = governed_call(&governor, Duration::from_secs(1), async {
        Err::<(), _>("connection reset")
    })
    .await
    .unwrap_err();
    assert!(matches!(err, JobError::Downstream(ref m) if m == "connection reset"));
    assert_eq!(governor.status().consecutive_errors, 1);
    assert_eq!(governor.status().requests_in_window, 2);
}

#[tokio::test(start_paused = true)]
async fn test_governed_call_timeout_counts_as_error() {
    let runner = runner_with(GovernorConfig::default()).with_deadline(Duration::from_secs(1));

    let err = runner
        .call(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, String>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Timeout(d) if d == Duration::from_secs(1)));
    assert_eq!(ResponseClass::of(&err), ResponseClass::TookTooLong);
    assert_eq!(runner.governor().status().consecutive_errors, 1);
}

#[tokio::test]
async fn test_call_denied_when_window_full() {
    let runner = runner_with(GovernorConfig {
        max_requests_per_window: 1,
        rate_window_ms: 60_000,
        ..GovernorConfig::default()
    });

    runner.call(async { Ok::<_, String>(()) }).await.unwrap();
    let err = runner.call(async { Ok::<_, String>(()) }).await.unwrap_err();

    match &err {
        JobError::AdmissionDenied(denied) => assert_eq!(denied.reason, DenialReason::RateLimited),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ResponseClass::of(&err), ResponseClass::TryLater);
    assert!(err.retry_after().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_call_with_retry_recovers() {
    let runner = runner_with(GovernorConfig::default());
    let attempts = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&attempts);
    let value = runner
        .call_with_retry(move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient")
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(runner.governor().status().consecutive_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_call_with_retry_gives_up() {
    let runner = runner_with(GovernorConfig::default()).with_max_attempts(2);
    let attempts = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&attempts);
    let err = runner
        .call_with_retry(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("still down")
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Downstream(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_submit_completes_job() {
    let runner = runner_with(GovernorConfig::default());

    let pid = runner
        .submit(
            StartJob::new("cron").with_total_units(2).with_owner("alice"),
            |ctx| async move {
                ctx.call("fetch_quotes", async { Ok::<_, String>(()) }).await?;
                ctx.heartbeat(1, Some(json!({"stage": "fetched"}))).await;
                ctx.log(LogLevel::Info, "analyze", "analysis done", None).await;
                ctx.heartbeat(2, None).await;
                Ok::<_, JobError>(Some(json!({"signals": 4})))
            },
        )
        .await;

    let job = wait_terminal(runner.lifecycle().store(), &pid).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.owner_id, "alice");
    assert_eq!(job.completed_units, 2);
    assert_eq!(job.detail["signals"], 4);
    assert_eq!(job.detail["stage"], "fetched");
    assert!(job.completed_at_ms.is_some());

    let messages: Vec<String> = runner
        .lifecycle()
        .job_logs(&pid)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert_eq!(messages.first().map(String::as_str), Some("job started"));
    assert!(messages.contains(&"fetch_quotes started".to_string()));
    assert!(messages.contains(&"fetch_quotes completed".to_string()));
    assert_eq!(messages.last().map(String::as_str), Some("job completed"));
}

#[tokio::test]
async fn test_submit_records_body_failure() {
    let runner = runner_with(GovernorConfig::default());

    let pid = runner
        .submit(StartJob::new("manual"), |_ctx| async move {
            Err::<Option<serde_json::Value>, _>("bad input")
        })
        .await;

    let job = wait_terminal(runner.lifecycle().store(), &pid).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("bad input"));
}

fn explode() -> Result<Option<serde_json::Value>, String> {
    panic!("body bug")
}

#[tokio::test]
async fn test_submit_panicking_body_marks_job_failed() {
    let runner = runner_with(GovernorConfig::default());

    let pid = runner
        .submit(StartJob::new("cron"), |_ctx| async move { explode() })
        .await;

    let job = wait_terminal(runner.lifecycle().store(), &pid).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.completed_at_ms.is_some());
    assert_eq!(job.error.as_deref(), Some("job panicked: body bug"));
    assert_eq!(job.detail["panicked"], true);

    let logs = runner.lifecycle().job_logs(&pid).await.unwrap();
    let last = logs.last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    assert_eq!(last.message, "job panicked: body bug");
}

#[tokio::test(start_paused = true)]
async fn test_submit_timeout_marks_job_failed() {
    let runner = runner_with(GovernorConfig::default());

    let pid = runner
        .submit_with_deadline(StartJob::new("cron"), Duration::from_secs(1), |_ctx| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, String>(Some(json!({"late": true})))
        })
        .await;

    let job = wait_terminal(runner.lifecycle().store(), &pid).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.detail["timed_out"], true);
    assert!(job.detail.get("late").is_none());
    assert_eq!(job.error.as_deref(), Some("job timed out after 1s"));

    // the abandoned body never gets to overwrite the terminal record
    tokio::time::sleep(Duration::from_secs(120)).await;
    let after = runner.lifecycle().store().get(&pid).await.unwrap().unwrap();
    assert_eq!(after, job);
}

#[tokio::test]
async fn test_api_surface() {
    let runner = runner_with(GovernorConfig::default());
    let pid = runner
        .lifecycle()
        .start_job(StartJob::new("manual").with_owner("alice"))
        .await;

    let ok = job_status(runner.lifecycle(), &StaticIdentity(Some("alice".into())), &pid)
        .await
        .unwrap();
    assert_eq!(ok.job.process_id, pid);

    let forbidden = job_status(runner.lifecycle(), &StaticIdentity(Some("bob".into())), &pid)
        .await
        .unwrap_err();
    assert_eq!(forbidden.class.http_status(), 403);

    let missing = job_status(runner.lifecycle(), &StaticIdentity(Some("alice".into())), "nope")
        .await
        .unwrap_err();
    assert_eq!(missing.class, ResponseClass::NotFound);

    let status = governor_status(runner.governor());
    assert!(status.accepting);
    assert!(!health(runner.governor()).breaker_open);

    let body = serde_json::to_value(&status).unwrap();
    assert_eq!(body["open"], false);
    assert_eq!(body["accepting"], true);
}

#[tokio::test]
async fn test_build_service_rejects_invalid_config() {
    let mut cfg = ServiceConfig::default();
    cfg.governor.max_requests_per_window = 0;

    let err = build_service(&cfg, TokioSpawner::current()).unwrap_err();
    assert!(format!("{err:#}").contains("max_requests_per_window"));
}

#[tokio::test]
async fn test_build_service_with_file_store_survives_restart() {
    let dir = std::env::temp_dir().join(format!("job-governor-it-{}", new_process_id()));
    let cfg = ServiceConfig {
        store: StoreBackendConfig::File { path: dir.clone() },
        ..ServiceConfig::default()
    };

    let service: JobService<TokioSpawner> = build_service(&cfg, TokioSpawner::current()).unwrap();
    let pid = service
        .runner
        .submit(StartJob::new("cron"), |ctx| async move {
            ctx.heartbeat(1, None).await;
            Ok::<_, String>(None)
        })
        .await;
    let finished = wait_terminal(service.lifecycle.store(), &pid).await;
    assert_eq!(finished.status, JobStatus::Completed);
    drop(service);

    let reopened = FileJobStore::open(&dir, "jobs").unwrap();
    let job = reopened.get(&pid).await.unwrap().unwrap();
    assert_eq!(job, finished);
    assert!(!reopened.logs(&pid).await.unwrap().is_empty());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_service_tap_sees_fallbacks_and_events() {
    let service = build_service(&ServiceConfig::default(), TokioSpawner::current()).unwrap();
    service
        .lifecycle
        .append_log("p1", LogLevel::Info, "cron", "run", "hello", None)
        .await;

    let events = service.events.events();
    assert!(events.iter().any(|e| e.message == "hello" && e.component == "lifecycle"));
    assert!(service.events.fallbacks().is_empty());
}
