//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::job::{JobRecord, JobUpdate, LogEntry, NewJob};
use crate::core::{JobStore, StoreError};

/// Jobs and their logs, keyed by process id.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) jobs: HashMap<String, JobRecord>,
    pub(crate) logs: HashMap<String, Vec<LogEntry>>,
}

impl Tables {
    pub(crate) fn get_or_create(&mut self, job: NewJob) -> (JobRecord, bool) {
        if let Some(existing) = self.jobs.get(&job.process_id) {
            return (existing.clone(), false);
        }
        let record = JobRecord::create(job);
        self.jobs.insert(record.process_id.clone(), record.clone());
        (record, true)
    }

    /// Returns the updated record and whether it changed.
    pub(crate) fn update(
        &mut self,
        process_id: &str,
        update: &JobUpdate,
    ) -> Option<(JobRecord, bool)> {
        let record = self.jobs.get_mut(process_id)?;
        let changed = record.apply(update);
        Some((record.clone(), changed))
    }

    pub(crate) fn append_log(&mut self, entry: LogEntry) -> Result<(), StoreError> {
        if !self.jobs.contains_key(&entry.process_id) {
            return Err(StoreError::MissingJob(entry.process_id));
        }
        self.logs
            .entry(entry.process_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }
}

/// Store keeping everything behind one mutex. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    tables: Mutex<Tables>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of job records.
    pub fn job_count(&self) -> usize {
        self.tables.lock().jobs.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get_or_create(&self, job: NewJob) -> Result<(JobRecord, bool), StoreError> {
        Ok(self.tables.lock().get_or_create(job))
    }

    async fn update(
        &self,
        process_id: &str,
        update: JobUpdate,
    ) -> Result<Option<(JobRecord, bool)>, StoreError> {
        Ok(self.tables.lock().update(process_id, &update))
    }

    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.tables.lock().append_log(entry)
    }

    async fn get(&self, process_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.tables.lock().jobs.get(process_id).cloned())
    }

    async fn logs(&self, process_id: &str) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self
            .tables
            .lock()
            .logs
            .get(process_id)
            .cloned()
            .unwrap_or_default())
    }
}
