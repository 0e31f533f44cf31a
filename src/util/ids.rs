//! Identifiers for jobs and their owners.

/// Owner recorded on jobs started by the system rather than a user
/// (cron-triggered runs, recovery sweeps).
pub const SYSTEM_OWNER: &str = "system";

/// Generate a fresh process identifier.
pub fn new_process_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
