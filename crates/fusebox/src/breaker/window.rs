//! Time-bounded record of recent failures
//!
//! Owned by the breaker state machine and only ever touched under its lock;
//! no internal synchronization.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Hard cap on retained records; reaching it drops the oldest entry.
/// Pruning alone bounds memory under sustained low failure rates, the cap
/// bounds it under a failure storm faster than the window drains.
const MAX_RECORDS: usize = 1024;

/// One recorded failure.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// When the failure was observed.
    pub at: Instant,
    /// Short description of the failure cause.
    pub summary: String,
}

/// Sliding log of failures inside a fixed tracking window.
#[derive(Debug)]
pub(crate) struct FailureWindow {
    entries: VecDeque<FailureRecord>,
    window: Duration,
}

impl FailureWindow {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            window,
        }
    }

    /// Append a failure, pruning expired entries first.
    pub(crate) fn record(&mut self, now: Instant, summary: String) {
        self.prune(now);

        if self.entries.len() >= MAX_RECORDS {
            self.entries.pop_front();
        }

        self.entries.push_back(FailureRecord { at: now, summary });
    }

    /// Drop entries older than the window (lazy sweep, oldest first).
    pub(crate) fn prune(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.at) >= self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of failures still inside the window.
    ///
    /// Counts without pruning so read paths stay read-only.
    pub(crate) fn recent_count(&self, now: Instant) -> usize {
        self.entries
            .iter()
            .filter(|r| now.duration_since(r.at) < self.window)
            .count()
    }

    /// Snapshot of the in-window records, oldest first.
    pub(crate) fn recent(&self, now: Instant) -> Vec<FailureRecord> {
        self.entries
            .iter()
            .filter(|r| now.duration_since(r.at) < self.window)
            .cloned()
            .collect()
    }

    /// Forget everything; used on transition to closed (full trust reset).
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
