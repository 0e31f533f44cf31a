//! Wire a store, governor, lifecycle manager and runner from one config.

use std::sync::Arc;

use anyhow::Context;

use crate::config::{ServiceConfig, StoreBackendConfig};
use crate::core::{
    AppResult, ConnectionGovernor, EventLogger, InMemoryEventSink, JobError,
    JobLifecycleManager, JobStore,
};
use crate::infra::store::{FileJobStore, InMemoryJobStore};
use crate::runtime::{JobRunner, Spawn};
use crate::util::clock::{Clock, SystemClock};

/// Journal stream name used by the file backend.
pub const JOURNAL_STREAM: &str = "jobs";

/// Everything a caller needs to run governed work and track jobs.
#[derive(Debug, Clone)]
pub struct JobService<S> {
    /// Shared governor.
    pub governor: Arc<ConnectionGovernor>,
    /// Lifecycle manager.
    pub lifecycle: JobLifecycleManager,
    /// Runner composing both.
    pub runner: JobRunner<S>,
    /// In-memory tap receiving every event and fallback.
    pub events: InMemoryEventSink,
}

/// Open the configured store backend.
pub fn build_store(cfg: &StoreBackendConfig) -> Result<Arc<dyn JobStore>, JobError> {
    match cfg {
        StoreBackendConfig::InMemory => Ok(Arc::new(InMemoryJobStore::new())),
        StoreBackendConfig::File { path } => {
            let store = FileJobStore::open(path, JOURNAL_STREAM)?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the service on the system clock.
pub fn build_service<S>(cfg: &ServiceConfig, spawner: S) -> AppResult<JobService<S>>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    build_service_with_clock(cfg, spawner, Arc::new(SystemClock))
}

/// Build the service on an injected clock.
pub fn build_service_with_clock<S>(
    cfg: &ServiceConfig,
    spawner: S,
    clock: Arc<dyn Clock>,
) -> AppResult<JobService<S>>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate()
        .map_err(JobError::InvalidConfig)
        .context("service config rejected")?;

    let store = build_store(&cfg.store).context("opening job store")?;

    let events = InMemoryEventSink::new(cfg.jobs.fallback_buffer);
    let logger = EventLogger::new("lifecycle").with_tap(Arc::new(events.clone()));

    let governor = Arc::new(
        ConnectionGovernor::with_clock(cfg.governor.clone(), Arc::clone(&clock))
            .with_logger(logger.for_component("governor")),
    );
    let lifecycle = JobLifecycleManager::new(store)
        .with_clock(clock)
        .with_logger(logger)
        .with_system_owner(cfg.jobs.system_owner.clone());
    let runner = JobRunner::new(Arc::clone(&governor), lifecycle.clone(), spawner)
        .with_deadline(cfg.jobs.default_deadline())
        .with_max_attempts(cfg.jobs.max_attempts);

    tracing::info!(
        store = ?cfg.store,
        max_requests_per_window = cfg.governor.max_requests_per_window,
        max_consecutive_errors = cfg.governor.max_consecutive_errors,
        "job service built"
    );

    Ok(JobService {
        governor,
        lifecycle,
        runner,
        events,
    })
}
