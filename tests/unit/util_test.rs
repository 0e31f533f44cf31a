//! Tests for utility functions

use std::time::Duration;

use job_governor::util::{new_process_id, now_ms, Clock, ManualClock, SYSTEM_OWNER};

#[test]
fn test_now_ms_is_positive() {
    assert!(now_ms() > 0);
}

#[test]
fn test_manual_clock_advance() {
    let clock = ManualClock::new();
    let t0 = clock.now();
    clock.advance(Duration::from_secs(3));
    assert_eq!(clock.now().duration_since(t0), Duration::from_secs(3));
}

#[test]
fn test_process_id_format() {
    let id = new_process_id();
    assert_eq!(id.len(), 36);
    assert_eq!(id.matches('-').count(), 4);
}

#[test]
fn test_system_owner() {
    assert_eq!(SYSTEM_OWNER, "system");
}
