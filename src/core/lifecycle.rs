//! Job lifecycle manager.
//!
//! Tracks background jobs in the durable store: idempotent creation,
//! heartbeats, terminal transitions and an append-only audit log.
//!
//! Bookkeeping never fails the caller. A store error on any write path is
//! reported through [`EventLogger::fallback`] and the call returns normally.
//! Every log write is preceded by the same atomic get-or-create used by
//! [`JobLifecycleManager::start_job`], so an entry can never reference a job
//! that does not exist.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::core::event_logger::EventLogger;
use crate::core::job::{FinalStatus, JobSnapshot, JobUpdate, LogEntry, LogLevel, NewJob};
use crate::core::{JobError, JobStore, StoreError};
use crate::util::clock::{Clock, SystemClock};
use crate::util::ids::{new_process_id, SYSTEM_OWNER};

/// Kind recorded on jobs implicitly created by a log write or completion.
pub const IMPLICIT_KIND: &str = "implicit";

const CATEGORY: &str = "lifecycle";

/// Request to start (or reuse) a job.
#[derive(Debug, Clone, Default)]
pub struct StartJob {
    /// Caller-supplied handle; generated when absent.
    pub process_id: Option<String>,
    /// Initiating principal; the system owner when absent.
    pub owner_id: Option<String>,
    /// Category tag.
    pub kind: String,
    /// Expected work units; 0 when unknown.
    pub total_units: u64,
    /// Initial detail payload.
    pub detail: Option<Value>,
}

impl StartJob {
    /// Request for a job of `kind`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Use a caller-supplied process id.
    #[must_use]
    pub fn with_process_id(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = Some(process_id.into());
        self
    }

    /// Attribute the job to `owner_id`.
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Set the expected work units.
    #[must_use]
    pub const fn with_total_units(mut self, total_units: u64) -> Self {
        self.total_units = total_units;
        self
    }

    /// Set the initial detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Durable, idempotent job state machine over a [`JobStore`].
#[derive(Clone)]
pub struct JobLifecycleManager {
    store: Arc<dyn JobStore>,
    logger: EventLogger,
    clock: Arc<dyn Clock>,
    system_owner: String,
}

impl fmt::Debug for JobLifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLifecycleManager")
            .field("logger", &self.logger)
            .field("system_owner", &self.system_owner)
            .finish_non_exhaustive()
    }
}

impl JobLifecycleManager {
    /// Manager over `store` on the system clock.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            logger: EventLogger::new(CATEGORY),
            clock: Arc::new(SystemClock),
            system_owner: SYSTEM_OWNER.to_string(),
        }
    }

    /// Use an injected clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `logger` for events and fallbacks.
    #[must_use]
    pub fn with_logger(mut self, logger: EventLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Owner recorded on system-initiated jobs.
    #[must_use]
    pub fn with_system_owner(mut self, owner: impl Into<String>) -> Self {
        self.system_owner = owner.into();
        self
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Create the job if absent, otherwise leave it untouched. Always returns
    /// the process id, even when the store is unreachable.
    pub async fn start_job(&self, request: StartJob) -> String {
        let process_id = request.process_id.unwrap_or_else(new_process_id);
        let new_job = NewJob {
            process_id: process_id.clone(),
            owner_id: request
                .owner_id
                .unwrap_or_else(|| self.system_owner.clone()),
            kind: request.kind,
            total_units: request.total_units,
            detail: request.detail,
            started_at_ms: self.clock.now_ms(),
        };
        let kind = new_job.kind.clone();

        match self.store.get_or_create(new_job).await {
            Ok((_, true)) => {
                tracing::debug!(process_id = %process_id, kind = %kind, "job created");
            }
            Ok((existing, false)) => {
                tracing::debug!(
                    process_id = %process_id,
                    status = ?existing.status,
                    "job already exists; reusing"
                );
            }
            Err(e) => {
                let entry = self.entry(
                    &process_id,
                    LogLevel::Warning,
                    "start_job",
                    "job record not persisted",
                    None,
                );
                self.logger.fallback(&entry, &e);
            }
        }
        process_id
    }

    /// Append a log entry, creating the job first if it does not exist.
    pub async fn append_log(
        &self,
        process_id: &str,
        level: LogLevel,
        category: &str,
        operation: &str,
        message: &str,
        detail: Option<Value>,
    ) {
        self.logger
            .emit(level, category, operation, Some(process_id), message, detail.as_ref());
        let entry = LogEntry::new(
            process_id,
            level,
            category,
            operation,
            message,
            detail,
            self.clock.now_ms(),
        );
        let written = match self.ensure_job(process_id).await {
            Ok(()) => self.store.append_log(entry.clone()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.logger.fallback(&entry, &e);
        }
    }

    /// Record progress. Units never move backwards; terminal jobs are left
    /// alone.
    pub async fn heartbeat(&self, process_id: &str, completed_units: u64, detail: Option<Value>) {
        let update = JobUpdate::Progress {
            completed_units,
            detail: detail.clone(),
            at_ms: self.clock.now_ms(),
        };
        match self.store.update(process_id, update).await {
            Ok(Some((_, true))) => {}
            Ok(Some((record, false))) => {
                tracing::debug!(
                    process_id,
                    status = ?record.status,
                    "heartbeat ignored for terminal job"
                );
            }
            Ok(None) => {
                tracing::warn!(process_id, "heartbeat for unknown job ignored");
            }
            Err(e) => {
                let entry = self.entry(
                    process_id,
                    LogLevel::Debug,
                    "heartbeat",
                    "progress not persisted",
                    detail,
                );
                self.logger.fallback(&entry, &e);
            }
        }
    }

    /// Move the job to a terminal status, merging `detail` into its payload.
    ///
    /// Terminal jobs are never rewritten: a second completion is a logged
    /// no-op and the first terminal write stands. Returns whether this call
    /// performed the transition.
    pub async fn complete_job(
        &self,
        process_id: &str,
        status: FinalStatus,
        message: Option<&str>,
        detail: Option<Value>,
    ) -> bool {
        let update = JobUpdate::Complete {
            status,
            message: message.map(str::to_string),
            detail: detail.clone(),
            at_ms: self.clock.now_ms(),
        };
        let result = match self.ensure_job(process_id).await {
            Ok(()) => self.store.update(process_id, update).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(Some((record, true))) => {
                tracing::info!(process_id, status = ?record.status, "job finished");
                true
            }
            Ok(Some((record, false))) => {
                tracing::warn!(
                    process_id,
                    status = ?record.status,
                    requested = ?status,
                    "job already terminal; completion ignored"
                );
                false
            }
            Ok(None) => {
                let e = StoreError::MissingJob(process_id.to_string());
                let entry = self.entry(
                    process_id,
                    LogLevel::Error,
                    "complete_job",
                    message.unwrap_or("completion lost"),
                    detail,
                );
                self.logger.fallback(&entry, &e);
                false
            }
            Err(e) => {
                let entry = self.entry(
                    process_id,
                    LogLevel::Error,
                    "complete_job",
                    message.unwrap_or("completion not persisted"),
                    detail,
                );
                self.logger.fallback(&entry, &e);
                false
            }
        }
    }

    /// Run `operation` with a symmetric start/end audit trail. The end entry
    /// carries `duration_ms`, and is written on the error path too. The
    /// operation's own result is returned unchanged.
    pub async fn track_operation<F, T, E>(
        &self,
        process_id: &str,
        category: &str,
        operation: &str,
        work: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let started = self.clock.now();
        self.append_log(
            process_id,
            LogLevel::Info,
            category,
            operation,
            &format!("{operation} started"),
            None,
        )
        .await;

        let result = work.await;
        let elapsed = self.clock.now().saturating_duration_since(started);
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let (level, message, detail) = match &result {
            Ok(_) => (
                LogLevel::Info,
                format!("{operation} completed"),
                json!({ "duration_ms": duration_ms }),
            ),
            Err(e) => (
                LogLevel::Error,
                format!("{operation} failed: {e}"),
                json!({ "duration_ms": duration_ms, "error": e.to_string() }),
            ),
        };
        self.append_log(process_id, level, category, operation, &message, Some(detail))
            .await;
        result
    }

    /// Audit trail of a job, in append order.
    pub async fn job_logs(&self, process_id: &str) -> Result<Vec<LogEntry>, JobError> {
        Ok(self.store.logs(process_id).await?)
    }

    /// Status of a job as seen by `owner_id`.
    ///
    /// Unauthenticated callers are refused. Jobs owned by the system owner
    /// are visible to every authenticated caller; other jobs only to their
    /// owner.
    pub async fn get_job_status(
        &self,
        process_id: &str,
        owner_id: Option<&str>,
    ) -> Result<JobSnapshot, JobError> {
        let Some(caller) = owner_id else {
            return Err(JobError::Forbidden("authentication required".into()));
        };
        let record = self
            .store
            .get(process_id)
            .await?
            .ok_or_else(|| JobError::NotFound(process_id.to_string()))?;
        if record.owner_id != caller && record.owner_id != self.system_owner {
            return Err(JobError::Forbidden(format!(
                "job {process_id} belongs to another user"
            )));
        }
        Ok(record.snapshot())
    }

    async fn ensure_job(&self, process_id: &str) -> Result<(), StoreError> {
        let placeholder = NewJob {
            process_id: process_id.to_string(),
            owner_id: self.system_owner.clone(),
            kind: IMPLICIT_KIND.to_string(),
            total_units: 0,
            detail: None,
            started_at_ms: self.clock.now_ms(),
        };
        let (_, created) = self.store.get_or_create(placeholder).await?;
        if created {
            tracing::debug!(process_id, "job created implicitly by a dependent write");
        }
        Ok(())
    }

    fn entry(
        &self,
        process_id: &str,
        level: LogLevel,
        operation: &str,
        message: &str,
        detail: Option<Value>,
    ) -> LogEntry {
        LogEntry::new(
            process_id,
            level,
            CATEGORY,
            operation,
            message,
            detail,
            self.clock.now_ms(),
        )
    }
}
