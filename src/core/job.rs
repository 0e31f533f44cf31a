//! Job records, log entries, and the transitions between job states.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job is running.
    Running,
    /// Job finished successfully.
    Completed,
    /// Job finished with an error.
    Failed,
}

impl JobStatus {
    /// True for `Completed` and `Failed`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Terminal status requested by a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl From<FinalStatus> for JobStatus {
    fn from(status: FinalStatus) -> Self {
        match status {
            FinalStatus::Completed => Self::Completed,
            FinalStatus::Failed => Self::Failed,
        }
    }
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal progress.
    Info,
    /// Something unexpected but recoverable.
    Warning,
    /// A failure.
    Error,
}

/// Fields for creating a job when none exists yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    /// Unique process handle.
    pub process_id: String,
    /// Initiating principal, or the system sentinel.
    pub owner_id: String,
    /// Category tag (`cron`, `manual`, ...).
    pub kind: String,
    /// Expected work units; 0 when unknown.
    pub total_units: u64,
    /// Initial detail payload.
    pub detail: Option<Value>,
    /// Creation time, milliseconds since epoch.
    pub started_at_ms: u128,
}

/// Durable job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique process handle.
    pub process_id: String,
    /// Initiating principal, or the system sentinel.
    pub owner_id: String,
    /// Current status.
    pub status: JobStatus,
    /// Category tag.
    pub kind: String,
    /// Expected work units; 0 when unknown.
    pub total_units: u64,
    /// Units done so far. Never decreases.
    pub completed_units: u64,
    /// Creation time.
    pub started_at_ms: u128,
    /// Last progress or status change.
    pub updated_at_ms: u128,
    /// Set exactly once, at the terminal transition.
    pub completed_at_ms: Option<u128>,
    /// Final message of a completed job.
    pub message: Option<String>,
    /// Final message of a failed job.
    pub error: Option<String>,
    /// Structured detail, merged across updates.
    pub detail: Value,
}

/// A change applied to an existing job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobUpdate {
    /// Heartbeat with progress.
    Progress {
        /// Units done so far.
        completed_units: u64,
        /// Detail keys to merge.
        detail: Option<Value>,
        /// Update time.
        at_ms: u128,
    },
    /// Terminal transition.
    Complete {
        /// Requested terminal status.
        status: FinalStatus,
        /// Final message.
        message: Option<String>,
        /// Detail keys to merge.
        detail: Option<Value>,
        /// Completion time.
        at_ms: u128,
    },
}

impl JobRecord {
    /// Fresh `Running` record for `new`.
    pub fn create(new: NewJob) -> Self {
        Self {
            process_id: new.process_id,
            owner_id: new.owner_id,
            status: JobStatus::Running,
            kind: new.kind,
            total_units: new.total_units,
            completed_units: 0,
            started_at_ms: new.started_at_ms,
            updated_at_ms: new.started_at_ms,
            completed_at_ms: None,
            message: None,
            error: None,
            detail: new.detail.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        }
    }

    /// Apply `update`. Terminal records are never changed.
    /// Returns whether the record changed.
    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match update {
            JobUpdate::Progress {
                completed_units,
                detail,
                at_ms,
            } => {
                let mut units = (*completed_units).max(self.completed_units);
                if self.total_units > 0 {
                    units = units.min(self.total_units);
                }
                self.completed_units = units;
                if let Some(patch) = detail {
                    merge_detail(&mut self.detail, patch);
                }
                self.updated_at_ms = *at_ms;
            }
            JobUpdate::Complete {
                status,
                message,
                detail,
                at_ms,
            } => {
                self.status = (*status).into();
                match status {
                    FinalStatus::Completed => self.message.clone_from(message),
                    FinalStatus::Failed => self.error.clone_from(message),
                }
                if let Some(patch) = detail {
                    merge_detail(&mut self.detail, patch);
                }
                self.updated_at_ms = *at_ms;
                self.completed_at_ms = Some(*at_ms);
            }
        }
        true
    }

    /// Read-only view for API callers.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            process_id: self.process_id.clone(),
            status: self.status,
            kind: self.kind.clone(),
            started_at_ms: self.started_at_ms,
            completed_at_ms: self.completed_at_ms,
            total_units: self.total_units,
            completed_units: self.completed_units,
            progress_percent: progress_percent(self.completed_units, self.total_units),
            error: self.error.clone(),
            detail: self.detail.clone(),
        }
    }
}

/// Shallow merge: keys in `patch` overwrite, others are kept. A non-object
/// on either side makes `patch` replace `target`.
pub fn merge_detail(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (k, v) in incoming {
                existing.insert(k.clone(), v.clone());
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// `round(completed / total * 100)`, 0 when `total` is 0.
pub fn progress_percent(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(completed) * 100 + u128::from(total) / 2) / u128::from(total);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// Durable, append-only log line attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Owning job.
    pub process_id: String,
    /// Severity.
    pub level: LogLevel,
    /// Category tag.
    pub category: String,
    /// Operation name.
    pub operation: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub detail: Option<Value>,
    /// Timestamp milliseconds.
    pub timestamp_ms: u128,
}

impl LogEntry {
    /// Build a log entry.
    pub fn new(
        process_id: impl Into<String>,
        level: LogLevel,
        category: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
        detail: Option<Value>,
        timestamp_ms: u128,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            level,
            category: category.into(),
            operation: operation.into(),
            message: message.into(),
            detail,
            timestamp_ms,
        }
    }
}

/// Job view returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Process handle.
    pub process_id: String,
    /// Current status.
    pub status: JobStatus,
    /// Category tag.
    pub kind: String,
    /// Creation time.
    pub started_at_ms: u128,
    /// Terminal transition time.
    pub completed_at_ms: Option<u128>,
    /// Expected work units.
    pub total_units: u64,
    /// Units done.
    pub completed_units: u64,
    /// Rounded completion percentage.
    pub progress_percent: u8,
    /// Failure message.
    pub error: Option<String>,
    /// Structured detail.
    pub detail: Value,
}
