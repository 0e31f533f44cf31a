//! Unit tests for individual components

mod error_test;
mod event_logger_test;
mod config_test;
mod util_test;
mod runtime_test;
