//! Core admission control and job lifecycle tracking.

pub mod backoff;
pub mod circuit_breaker;
pub mod deadline;
pub mod error;
pub mod event_logger;
pub mod governor;
pub mod job;
pub mod lifecycle;
pub mod rate_limiter;
pub mod store;

pub use backoff::BackoffCalculator;
pub use circuit_breaker::{BreakerCheck, CircuitBreaker};
pub use deadline::run_with_deadline;
pub use error::{AdmissionDenied, AppResult, DeadlineError, DenialReason, JobError, StoreError};
pub use event_logger::{EventLogger, EventSink, InMemoryEventSink, LogEvent};
pub use governor::{ConnectionGovernor, GovernorStatus};
pub use job::{
    FinalStatus, JobRecord, JobSnapshot, JobStatus, JobUpdate, LogEntry, LogLevel, NewJob,
};
pub use lifecycle::{JobLifecycleManager, StartJob};
pub use rate_limiter::RateLimiter;
pub use store::JobStore;
