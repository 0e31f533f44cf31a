//! # Job Governor
//!
//! Resilient background-job plumbing for services that share a rate-limited,
//! failure-prone downstream dependency (typically the persistence layer).
//!
//! Two parts work together:
//!
//! - **Connection governor**: a sliding-window rate limiter, a circuit breaker
//!   and an exponential backoff calculator behind one admission API. Callers
//!   ask before every downstream call and report the outcome afterwards.
//! - **Job lifecycle manager**: a durable, idempotent state machine for
//!   long-running jobs (scheduled analysis runs, batch executions). Job
//!   creation is an atomic get-or-create, log entries always follow their
//!   job record, and bookkeeping failures never abort the job itself.
//!
//! ## Key Features
//!
//! - **Edge-triggered breaker**: opens once when the error streak crosses the
//!   threshold, recloses on the first check after the cooldown
//! - **Single critical section**: admission state lives behind one mutex, so
//!   check-and-count is atomic under a multi-threaded runtime
//! - **Deadlines**: job bodies and governed calls race a timer; a timeout is
//!   reported distinctly from a downstream failure
//! - **Fallback logging**: durable log writes that fail are kept on the
//!   tracing output and an in-memory tap instead of propagating
//! - **Durable journal**: the file store replays its JSON-lines journal on
//!   open, so job state survives restarts
//!
//! ```rust,ignore
//! use job_governor::builders::build_service;
//! use job_governor::config::ServiceConfig;
//! use job_governor::core::StartJob;
//! use job_governor::runtime::TokioSpawner;
//!
//! let service = build_service(&ServiceConfig::from_env()?, TokioSpawner::current())?;
//!
//! let pid = service
//!     .runner
//!     .submit(StartJob::new("cron").with_total_units(3), |ctx| async move {
//!         for unit in 1..=3 {
//!             ctx.call("fetch", fetch_batch(unit)).await?;
//!             ctx.heartbeat(unit, None).await;
//!         }
//!         Ok::<_, job_governor::core::JobError>(None)
//!     })
//!     .await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Admission control, job state machine, and their error types.
pub mod core;
/// Configuration models for the governor, jobs, and store backends.
pub mod config;
/// Builders to construct the service from configuration.
pub mod builders;
/// Store backends.
pub mod infra;
/// Runner, spawner, and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
