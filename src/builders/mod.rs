//! Builders to construct the job subsystem from configuration.

pub mod service_builder;

pub use service_builder::{build_service, build_service_with_clock, build_store, JobService};
