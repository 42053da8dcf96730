//! Read-only metrics snapshot exposed by breakers and the registry

use std::time::Duration;

use serde::Serialize;

use crate::breaker::CircuitState;

/// Point-in-time view of one breaker's counters and state.
///
/// Snapshots are plain data: producing one never mutates the breaker, and a
/// snapshot does not track the breaker after it is taken.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Breaker name.
    pub name: String,
    /// State at snapshot time.
    pub state: CircuitState,
    /// Requests seen by `execute`, including rejected ones.
    pub total_requests: u64,
    /// Guarded calls that completed successfully.
    pub successful_requests: u64,
    /// Guarded calls that failed or timed out.
    pub failed_requests: u64,
    /// Calls rejected without invoking the operation.
    pub rejected_requests: u64,
    /// Subset of failures caused by the per-call deadline.
    pub timeouts: u64,
    /// Number of state transitions since creation (or last reset).
    pub state_changes: u64,
    /// Failure records currently inside the tracking window.
    pub recent_failures: usize,
    /// Consecutive successes; meaningful while half-open.
    pub consecutive_successes: u64,
    /// How long the circuit has been open, when it is.
    pub opened_for: Option<Duration>,
    /// Time since the most recent state transition.
    pub since_last_state_change: Duration,
    /// Successful requests as a percentage of total (100.0 when idle).
    pub success_rate_percent: f64,
}

impl MetricsSnapshot {
    /// Success rate over executed (non-rejected) calls, 0.0–1.0.
    #[must_use]
    pub fn executed_success_rate(&self) -> f64 {
        let executed = self.successful_requests + self.failed_requests;
        if executed == 0 {
            1.0
        } else {
            self.successful_requests as f64 / executed as f64
        }
    }
}
