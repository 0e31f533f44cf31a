//! Structured, leveled event logging with a best-effort fallback channel.
//!
//! Every event goes to `tracing`. Events can also be mirrored into an
//! [`EventSink`] tap, which is how dropped durable writes stay observable in
//! tests and in-process diagnostics.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::job::{LogEntry, LogLevel};
use crate::util::clock::now_ms;

/// Event captured by a sink.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Severity.
    pub level: LogLevel,
    /// Emitting component (`governor`, `lifecycle`, ...).
    pub component: String,
    /// Category tag.
    pub category: String,
    /// Operation name.
    pub operation: String,
    /// Related job, if any.
    pub process_id: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub detail: Option<Value>,
    /// True when the event stands in for a failed durable write.
    pub fallback: bool,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Receiver for mirrored events.
pub trait EventSink: Send + Sync {
    /// Record an event. Must not fail.
    fn record(&self, event: LogEvent);
}

/// Bounded in-memory sink; the oldest event is dropped when full.
#[derive(Debug, Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<VecDeque<LogEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink holding at most `max_events`.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Only the events that replaced a failed durable write.
    pub fn fallbacks(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.fallback)
            .cloned()
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: LogEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Leveled logger shared by the governor and the lifecycle manager.
#[derive(Clone)]
pub struct EventLogger {
    component: String,
    tap: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLogger")
            .field("component", &self.component)
            .field("tap", &self.tap.is_some())
            .finish()
    }
}

impl EventLogger {
    /// Logger for `component` with no tap.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            tap: None,
        }
    }

    /// Mirror events into `sink`.
    #[must_use]
    pub fn with_tap(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.tap = Some(sink);
        self
    }

    /// Same tap, different component name.
    #[must_use]
    pub fn for_component(&self, component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            tap: self.tap.clone(),
        }
    }

    /// Emit a structured event.
    pub fn emit(
        &self,
        level: LogLevel,
        category: &str,
        operation: &str,
        process_id: Option<&str>,
        message: &str,
        detail: Option<&Value>,
    ) {
        let component = self.component.as_str();
        let pid = process_id.unwrap_or("-");
        let detail_str = detail.map(Value::to_string).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(
                component,
                category,
                operation,
                process_id = pid,
                detail = %detail_str,
                "{message}"
            ),
            LogLevel::Info => tracing::info!(
                component,
                category,
                operation,
                process_id = pid,
                detail = %detail_str,
                "{message}"
            ),
            LogLevel::Warning => tracing::warn!(
                component,
                category,
                operation,
                process_id = pid,
                detail = %detail_str,
                "{message}"
            ),
            LogLevel::Error => tracing::error!(
                component,
                category,
                operation,
                process_id = pid,
                detail = %detail_str,
                "{message}"
            ),
        }
        self.mirror(LogEvent {
            level,
            component: self.component.clone(),
            category: category.to_string(),
            operation: operation.to_string(),
            process_id: process_id.map(str::to_string),
            message: message.to_string(),
            detail: detail.cloned(),
            fallback: false,
            created_at_ms: now_ms(),
        });
    }

    /// Report a durable write that did not happen. Never fails.
    pub fn fallback(&self, entry: &LogEntry, cause: &dyn fmt::Display) {
        let encoded = serde_json::to_string(entry)
            .unwrap_or_else(|_| format!("{}: {}", entry.operation, entry.message));
        tracing::warn!(
            target: "job_governor::fallback",
            component = self.component.as_str(),
            process_id = entry.process_id.as_str(),
            cause = %cause,
            entry = %encoded,
            "durable log write failed; entry kept on fallback channel"
        );
        self.mirror(LogEvent {
            level: entry.level,
            component: self.component.clone(),
            category: entry.category.clone(),
            operation: entry.operation.clone(),
            process_id: Some(entry.process_id.clone()),
            message: entry.message.clone(),
            detail: entry.detail.clone(),
            fallback: true,
            created_at_ms: entry.timestamp_ms,
        });
    }

    fn mirror(&self, event: LogEvent) {
        if let Some(tap) = &self.tap {
            tap.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_overflow_drops_oldest() {
        let sink = InMemoryEventSink::new(2);
        let logger = EventLogger::new("test").with_tap(Arc::new(sink.clone()));

        logger.emit(LogLevel::Info, "c", "op1", None, "one", None);
        logger.emit(LogLevel::Info, "c", "op2", None, "two", None);
        logger.emit(LogLevel::Info, "c", "op3", None, "three", None);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].operation, "op2");
        assert_eq!(events[1].operation, "op3");
    }

    #[test]
    fn test_fallback_marks_event() {
        let sink = InMemoryEventSink::new(8);
        let logger = EventLogger::new("lifecycle").with_tap(Arc::new(sink.clone()));
        let entry = LogEntry::new("p1", LogLevel::Error, "cron", "run", "boom", None, 7);

        logger.fallback(&entry, &"disk full");

        let fallbacks = sink.fallbacks();
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].process_id.as_deref(), Some("p1"));
        assert_eq!(fallbacks[0].created_at_ms, 7);
    }
}
