//! Durable record store abstraction.

use async_trait::async_trait;

use crate::core::job::{JobRecord, JobUpdate, LogEntry, NewJob};
use crate::core::StoreError;

/// Record store consumed by the lifecycle manager.
///
/// Implementations must make [`JobStore::get_or_create`] and
/// [`JobStore::update`] atomic per `process_id`: two callers racing on the
/// same id must observe exactly one created record.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Upsert with an empty update branch: create the job if absent,
    /// otherwise leave it untouched. Returns the stored record and whether
    /// this call created it.
    async fn get_or_create(&self, job: NewJob) -> Result<(JobRecord, bool), StoreError>;

    /// Apply `update` to an existing record inside one critical section.
    /// Returns the stored record and whether the update changed it, or
    /// `None` when the job does not exist.
    async fn update(
        &self,
        process_id: &str,
        update: JobUpdate,
    ) -> Result<Option<(JobRecord, bool)>, StoreError>;

    /// Append a log entry. The owning job must already exist.
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError>;

    /// Fetch a job.
    async fn get(&self, process_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Log entries for a job, in append order.
    async fn logs(&self, process_id: &str) -> Result<Vec<LogEntry>, StoreError>;
}
