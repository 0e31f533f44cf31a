//! Governed execution of downstream calls and background jobs.
//!
//! A call asks the [`ConnectionGovernor`] for admission, runs under a
//! deadline, and feeds its outcome back to the governor. A background job
//! is recorded through the [`JobLifecycleManager`], spawned, raced against
//! its deadline, and completed as `COMPLETED` or `FAILED` whatever happens
//! to its body.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Value};

use crate::core::{
    run_with_deadline, ConnectionGovernor, DeadlineError, FinalStatus, JobError,
    JobLifecycleManager, LogLevel, StartJob,
};
use crate::runtime::Spawn;

const CATEGORY: &str = "job";

/// Admit, run under `deadline`, and record the outcome.
///
/// Timeouts count as governor errors: a dependency that hangs is as
/// unhealthy as one that fails.
pub async fn governed_call<Fut, T, E>(
    governor: &ConnectionGovernor,
    deadline: Duration,
    operation: Fut,
) -> Result<T, JobError>
where
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    governor.admit()?;
    match run_with_deadline(operation, deadline).await {
        Ok(value) => {
            governor.record_success();
            Ok(value)
        }
        Err(DeadlineError::Timeout(after)) => {
            governor.record_outcome(false, Some("deadline exceeded"));
            Err(JobError::Timeout(after))
        }
        Err(DeadlineError::Failed(e)) => {
            let message = e.to_string();
            governor.record_outcome(false, Some(&message));
            Err(JobError::Downstream(message))
        }
    }
}

/// Handle given to a running job body.
#[derive(Clone, Debug)]
pub struct JobContext {
    process_id: String,
    lifecycle: JobLifecycleManager,
    governor: Arc<ConnectionGovernor>,
    call_deadline: Duration,
}

impl JobContext {
    /// The job's process id.
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    /// Report progress.
    pub async fn heartbeat(&self, completed_units: u64, detail: Option<Value>) {
        self.lifecycle
            .heartbeat(&self.process_id, completed_units, detail)
            .await;
    }

    /// Write to the job's audit trail.
    pub async fn log(
        &self,
        level: LogLevel,
        operation: &str,
        message: &str,
        detail: Option<Value>,
    ) {
        self.lifecycle
            .append_log(&self.process_id, level, CATEGORY, operation, message, detail)
            .await;
    }

    /// Governed downstream call from inside the job, with a start/end audit
    /// trail under `operation`.
    pub async fn call<Fut, T, E>(&self, operation: &str, work: Fut) -> Result<T, JobError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let guarded = governed_call(&self.governor, self.call_deadline, work);
        self.lifecycle
            .track_operation(&self.process_id, CATEGORY, operation, guarded)
            .await
    }
}

/// Runs governed calls and background jobs.
#[derive(Debug, Clone)]
pub struct JobRunner<S> {
    governor: Arc<ConnectionGovernor>,
    lifecycle: JobLifecycleManager,
    spawner: S,
    deadline: Duration,
    max_attempts: u32,
}

impl<S> JobRunner<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Runner with a five minute deadline and three attempts per retried call.
    pub fn new(
        governor: Arc<ConnectionGovernor>,
        lifecycle: JobLifecycleManager,
        spawner: S,
    ) -> Self {
        Self {
            governor,
            lifecycle,
            spawner,
            deadline: Duration::from_secs(300),
            max_attempts: 3,
        }
    }

    /// Deadline for calls and job bodies.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Attempts made by [`Self::call_with_retry`]. At least one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Shared governor.
    pub const fn governor(&self) -> &Arc<ConnectionGovernor> {
        &self.governor
    }

    /// Lifecycle manager.
    pub const fn lifecycle(&self) -> &JobLifecycleManager {
        &self.lifecycle
    }

    /// One governed downstream call.
    pub async fn call<Fut, T, E>(&self, operation: Fut) -> Result<T, JobError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        governed_call(&self.governor, self.deadline, operation).await
    }

    /// Governed call retried on retryable errors. Admission denials wait
    /// for the governor's `retry_after` hint, failures and timeouts for the
    /// current backoff delay.
    pub async fn call_with_retry<F, Fut, T, E>(&self, mut factory: F) -> Result<T, JobError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match self.call(factory()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let wait = e
                        .retry_after()
                        .unwrap_or_else(|| self.governor.backoff_delay());
                    tracing::debug!(attempt, ?wait, error = %e, "retrying governed call");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Start a job and run `body` in the background under the default
    /// deadline. Returns the process id immediately.
    pub async fn submit<F, Fut, E>(&self, request: StartJob, body: F) -> String
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<Value>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.submit_with_deadline(request, self.deadline, body).await
    }

    /// Like [`Self::submit`] with an explicit deadline for this job.
    ///
    /// The body's `Ok` detail is merged into the job's payload on
    /// completion. On timeout the job is marked `FAILED` with
    /// `timed_out: true` in its detail; whatever the body produces after
    /// that is discarded. A panicking body is marked `FAILED` with
    /// `panicked: true`.
    pub async fn submit_with_deadline<F, Fut, E>(
        &self,
        request: StartJob,
        deadline: Duration,
        body: F,
    ) -> String
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<Value>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let process_id = self.lifecycle.start_job(request).await;
        let ctx = JobContext {
            process_id: process_id.clone(),
            lifecycle: self.lifecycle.clone(),
            governor: Arc::clone(&self.governor),
            call_deadline: self.deadline,
        };
        let lifecycle = self.lifecycle.clone();
        let pid = process_id.clone();

        self.spawner.spawn(async move {
            lifecycle
                .append_log(&pid, LogLevel::Info, CATEGORY, "run", "job started", None)
                .await;

            let guarded = AssertUnwindSafe(async move { body(ctx).await }).catch_unwind();
            let (status, message, detail) = match run_with_deadline(guarded, deadline).await {
                Ok(Ok(detail)) => (FinalStatus::Completed, "job completed".to_string(), detail),
                Ok(Err(e)) => (FinalStatus::Failed, e.to_string(), None),
                Err(DeadlineError::Timeout(after)) => (
                    FinalStatus::Failed,
                    format!("job timed out after {after:?}"),
                    Some(json!({ "timed_out": true })),
                ),
                Err(DeadlineError::Failed(panic)) => (
                    FinalStatus::Failed,
                    format!("job panicked: {}", panic_message(panic.as_ref())),
                    Some(json!({ "panicked": true })),
                ),
            };

            let level = match status {
                FinalStatus::Completed => LogLevel::Info,
                FinalStatus::Failed => LogLevel::Error,
            };
            lifecycle
                .append_log(&pid, level, CATEGORY, "run", &message, None)
                .await;
            lifecycle
                .complete_job(&pid, status, Some(&message), detail)
                .await;
        });

        process_id
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
