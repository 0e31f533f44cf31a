//! Infrastructure adapters for job storage backends.

pub mod store;

pub use store::{FileJobStore, InMemoryJobStore};
