//! Transition records and event sinks
//!
//! Every breaker state transition produces a [`TransitionRecord`] that is
//! dispatched to the attached sinks after the breaker's lock is released.
//! The engine neither retries nor queues failed emissions; a sink error is
//! logged and swallowed so it can never affect the guarded call.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::breaker::CircuitState;
use crate::core::MetricsSnapshot;

/// Error type sinks may return from an emission.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Record of a single state transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionRecord {
    /// Name of the breaker that transitioned.
    pub breaker_name: String,
    /// State before the transition.
    pub previous: CircuitState,
    /// State after the transition.
    pub next: CircuitState,
    /// Counters at transition time.
    pub metrics: MetricsSnapshot,
    /// Failures inside the tracking window at transition time.
    pub recent_failures: usize,
}

/// Receiver for transition records.
pub trait EventSink: Send + Sync {
    /// Accept one transition record.
    fn emit(&self, record: &TransitionRecord) -> Result<(), SinkError>;
}

/// Fan-out collection of sinks attached to a breaker.
///
/// Built before the breaker is shared, then immutable; cloning shares the
/// underlying list.
#[derive(Default, Clone)]
pub struct EventSinks {
    sinks: Arc<Vec<Arc<dyn EventSink>>>,
}

impl EventSinks {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to the collection.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        let sinks = Arc::make_mut(&mut self.sinks);
        sinks.push(sink);
        self
    }

    /// Whether any sinks are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Dispatch a record to every sink, containing emission failures.
    pub(crate) fn dispatch(&self, record: &TransitionRecord) {
        for sink in self.sinks.iter() {
            if let Err(error) = sink.emit(record) {
                warn!(
                    breaker = %record.breaker_name,
                    %error,
                    "event sink emission failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for EventSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSinks")
            .field("len", &self.sinks.len())
            .finish()
    }
}

/// Sink that logs transitions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, record: &TransitionRecord) -> Result<(), SinkError> {
        info!(
            breaker = %record.breaker_name,
            previous = %record.previous,
            next = %record.next,
            recent_failures = record.recent_failures,
            total_requests = record.metrics.total_requests,
            failed_requests = record.metrics.failed_requests,
            "circuit state changed"
        );
        Ok(())
    }
}

/// Default number of records a [`MemorySink`] retains.
const MEMORY_SINK_CAPACITY: usize = 256;

/// Sink that retains the most recent transitions in memory.
///
/// Handy for tests and for surfacing recent breaker history in diagnostics
/// endpoints without an external audit store.
#[derive(Debug)]
pub struct MemorySink {
    records: Mutex<Vec<TransitionRecord>>,
    capacity: usize,
}

impl MemorySink {
    /// Create a sink retaining the default number of records.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MEMORY_SINK_CAPACITY)
    }

    /// Create a sink retaining at most `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Copy of the retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<TransitionRecord> {
        self.records.lock().clone()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no transitions have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, record: &TransitionRecord) -> Result<(), SinkError> {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.remove(0);
        }
        records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(previous: CircuitState, next: CircuitState) -> TransitionRecord {
        TransitionRecord {
            breaker_name: "mail".to_string(),
            previous,
            next,
            metrics: MetricsSnapshot {
                name: "mail".to_string(),
                state: next,
                total_requests: 5,
                successful_requests: 2,
                failed_requests: 3,
                rejected_requests: 0,
                timeouts: 0,
                state_changes: 1,
                recent_failures: 3,
                consecutive_successes: 0,
                opened_for: Some(Duration::ZERO),
                since_last_state_change: Duration::ZERO,
                success_rate_percent: 40.0,
            },
            recent_failures: 3,
        }
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _record: &TransitionRecord) -> Result<(), SinkError> {
            Err("audit store unreachable".into())
        }
    }

    #[test]
    fn memory_sink_retains_records_in_order() {
        let sink = MemorySink::new();
        sink.emit(&record(CircuitState::Closed, CircuitState::Open))
            .unwrap();
        sink.emit(&record(CircuitState::Open, CircuitState::HalfOpen))
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].next, CircuitState::Open);
        assert_eq!(records[1].next, CircuitState::HalfOpen);
    }

    #[test]
    fn memory_sink_respects_capacity() {
        let sink = MemorySink::with_capacity(2);
        for _ in 0..5 {
            sink.emit(&record(CircuitState::Closed, CircuitState::Open))
                .unwrap();
        }
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn dispatch_contains_sink_failures() {
        let memory = Arc::new(MemorySink::new());
        let sinks = EventSinks::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(Arc::clone(&memory) as Arc<dyn EventSink>);

        // The failing sink must not prevent later sinks from observing the
        // record, and dispatch itself must not fail.
        sinks.dispatch(&record(CircuitState::Closed, CircuitState::Open));
        assert_eq!(memory.len(), 1);
    }
}
