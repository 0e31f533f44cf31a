//! Tests for the event logger and its in-memory sink

use std::sync::Arc;

use job_governor::core::{EventLogger, InMemoryEventSink, LogEntry, LogLevel};
use serde_json::json;

#[test]
fn test_emit_mirrors_into_tap() {
    let sink = InMemoryEventSink::new(10);
    let logger = EventLogger::new("lifecycle").with_tap(Arc::new(sink.clone()));

    logger.emit(
        LogLevel::Warning,
        "cron",
        "fetch_quotes",
        Some("p1"),
        "slow response",
        Some(&json!({"ms": 900})),
    );

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].component, "lifecycle");
    assert_eq!(events[0].level, LogLevel::Warning);
    assert_eq!(events[0].process_id.as_deref(), Some("p1"));
    assert_eq!(events[0].detail, Some(json!({"ms": 900})));
    assert!(!events[0].fallback);
}

#[test]
fn test_for_component_shares_tap() {
    let sink = InMemoryEventSink::new(10);
    let logger = EventLogger::new("lifecycle").with_tap(Arc::new(sink.clone()));
    let governor_logger = logger.for_component("governor");

    governor_logger.emit(LogLevel::Info, "governor", "breaker_closed", None, "closed", None);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].component, "governor");
}

#[test]
fn test_fallback_without_tap_does_not_panic() {
    let logger = EventLogger::new("lifecycle");
    let entry = LogEntry::new("p1", LogLevel::Error, "cron", "run", "lost", None, 1);
    logger.fallback(&entry, &"store offline");
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let sink = InMemoryEventSink::new(0);
    let logger = EventLogger::new("x").with_tap(Arc::new(sink.clone()));
    logger.emit(LogLevel::Debug, "c", "op", None, "m", None);
    assert!(sink.events().is_empty());
}
