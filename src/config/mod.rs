//! Configuration models for the governor, job tracking, and storage backends.

pub mod governor;
pub mod service;

pub use governor::GovernorConfig;
pub use service::{JobsConfig, ServiceConfig, StoreBackendConfig};
