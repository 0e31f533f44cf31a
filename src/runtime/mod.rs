//! Runtime adapters: background job execution and the API surface.

pub mod api;
pub mod runner;
pub mod tokio_spawner;

pub use api::{
    governor_status, health, job_status, ErrorResponse, GovernorStatusResponse, Health,
    IdentityProvider, JobStatusResponse, ResponseClass, StaticIdentity,
};
pub use runner::{governed_call, JobContext, JobRunner};
pub use tokio_spawner::{Spawn, TokioSpawner};
