//! Circuit-breaker state machine
//!
//! One [`Breaker`] guards one named dependency. It admits or rejects calls
//! based on its state, runs admitted operations under a deadline, and feeds
//! every outcome back into its failure window and counters. All mutable
//! state lives behind a single mutex per breaker; the guarded operation
//! itself always runs outside the critical section.

mod health;
mod window;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::core::constants::MIN_RATE_SAMPLES;
use crate::core::{BreakerConfig, BreakerError, BreakerResult, MetricsSnapshot};
use crate::fallback::Fallback;
use crate::observability::{EventSinks, TransitionRecord};

use self::health::HealthMonitor;
pub use self::health::HealthProbe;
pub use self::window::FailureRecord;
use self::window::FailureWindow;

/// Runtime state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Operations are allowed.
    Closed,
    /// Operations are rejected without being attempted.
    Open,
    /// Recovery is being probed; live calls are allowed and watched.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Cumulative per-breaker counters.
#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
    timeouts: u64,
    state_changes: u64,
}

/// Mutable breaker state; every field is guarded by the one mutex in
/// [`BreakerShared`].
struct BreakerCore {
    state: CircuitState,
    window: FailureWindow,
    consecutive_successes: u64,
    opened_at: Option<Instant>,
    last_state_change: Instant,
    counters: Counters,
    monitor: Option<HealthMonitor>,
}

/// State shared between breaker handles and the health-monitor task.
pub(crate) struct BreakerShared {
    pub(crate) name: String,
    pub(crate) config: BreakerConfig,
    pub(crate) core: Mutex<BreakerCore>,
    pub(crate) probe: Mutex<Option<Arc<dyn HealthProbe>>>,
    pub(crate) sinks: EventSinks,
}

impl BreakerShared {
    /// Apply a state transition and produce the record to dispatch.
    ///
    /// Must be called with `core` locked; the returned record is dispatched
    /// by the caller after the lock is released.
    pub(crate) fn transition(
        shared: &Arc<Self>,
        core: &mut BreakerCore,
        next: CircuitState,
    ) -> TransitionRecord {
        let now = Instant::now();
        let previous = core.state;
        core.state = next;
        core.last_state_change = now;
        core.counters.state_changes += 1;

        match next {
            CircuitState::Open => {
                core.opened_at = Some(now);
                core.consecutive_successes = 0;
                warn!(
                    breaker = %shared.name,
                    %previous,
                    failures_in_window = core.window.recent_count(now),
                    "circuit opened"
                );
                if shared.config.auto_recovery
                    && core.monitor.is_none()
                    && shared.probe.lock().is_some()
                {
                    core.monitor = Some(HealthMonitor::spawn(shared));
                }
            }
            CircuitState::HalfOpen => {
                core.consecutive_successes = 0;
                // Live traffic supersedes scheduled probing.
                if let Some(monitor) = core.monitor.take() {
                    monitor.stop();
                }
                info!(breaker = %shared.name, %previous, "circuit half-open");
            }
            CircuitState::Closed => {
                core.opened_at = None;
                core.consecutive_successes = 0;
                core.window.clear();
                if let Some(monitor) = core.monitor.take() {
                    monitor.stop();
                }
                info!(breaker = %shared.name, %previous, "circuit closed");
            }
        }

        let metrics = snapshot_locked(&shared.name, core, now);
        TransitionRecord {
            breaker_name: shared.name.clone(),
            previous,
            next,
            recent_failures: metrics.recent_failures,
            metrics,
        }
    }
}

impl Drop for BreakerShared {
    fn drop(&mut self) {
        if let Some(monitor) = self.core.get_mut().monitor.take() {
            monitor.stop();
        }
    }
}

fn snapshot_locked(name: &str, core: &BreakerCore, now: Instant) -> MetricsSnapshot {
    let counters = &core.counters;
    let success_rate_percent = if counters.total_requests == 0 {
        100.0
    } else {
        counters.successful_requests as f64 / counters.total_requests as f64 * 100.0
    };

    MetricsSnapshot {
        name: name.to_string(),
        state: core.state,
        total_requests: counters.total_requests,
        successful_requests: counters.successful_requests,
        failed_requests: counters.failed_requests,
        rejected_requests: counters.rejected_requests,
        timeouts: counters.timeouts,
        state_changes: counters.state_changes,
        recent_failures: core.window.recent_count(now),
        consecutive_successes: core.consecutive_successes,
        opened_for: core.opened_at.map(|at| now.duration_since(at)),
        since_last_state_change: now.duration_since(core.last_state_change),
        success_rate_percent,
    }
}

/// Circuit breaker for one named dependency.
///
/// Cheap to clone; clones share the same underlying state. Create
/// standalone breakers with [`Breaker::new`], or let a
/// [`BreakerRegistry`](crate::registry::BreakerRegistry) manage them by
/// name.
#[derive(Clone)]
pub struct Breaker {
    shared: Arc<BreakerShared>,
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Breaker {
    /// Create a breaker with the given configuration and no event sinks.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> BreakerResult<Self> {
        Self::with_sinks(name, config, EventSinks::new())
    }

    /// Create a breaker that dispatches transition records to `sinks`.
    pub fn with_sinks(
        name: impl Into<String>,
        config: BreakerConfig,
        sinks: EventSinks,
    ) -> BreakerResult<Self> {
        config.validate()?;

        let now = Instant::now();
        let core = BreakerCore {
            state: CircuitState::Closed,
            window: FailureWindow::new(config.failure_window),
            consecutive_successes: 0,
            opened_at: None,
            last_state_change: now,
            counters: Counters::default(),
            monitor: None,
        };

        Ok(Self {
            shared: Arc::new(BreakerShared {
                name: name.into(),
                config,
                core: Mutex::new(core),
                probe: Mutex::new(None),
                sinks,
            }),
        })
    }

    /// Breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The configuration the breaker was created with.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.shared.config
    }

    /// Current state. Read-only: querying never transitions the circuit.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.shared.core.lock().state
    }

    /// Whether the circuit is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Whether the circuit is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Whether the circuit is half-open.
    #[must_use]
    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// Number of failures currently inside the tracking window.
    #[must_use]
    pub fn recent_failures(&self) -> usize {
        let core = self.shared.core.lock();
        core.window.recent_count(Instant::now())
    }

    /// The failure records currently inside the tracking window, oldest
    /// first.
    #[must_use]
    pub fn recent_failure_records(&self) -> Vec<FailureRecord> {
        let core = self.shared.core.lock();
        core.window.recent(Instant::now())
    }

    /// Point-in-time metrics snapshot. Never mutates breaker state.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        let core = self.shared.core.lock();
        snapshot_locked(&self.shared.name, &core, Instant::now())
    }

    /// Whether two handles refer to the same breaker instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Register the recovery probe used while the circuit is open.
    ///
    /// Registered once per breaker; a later registration replaces the
    /// probe. If the circuit is already open with `auto_recovery` enabled,
    /// the monitor starts immediately (this requires a Tokio runtime, as
    /// does `execute`).
    pub fn set_health_check(&self, probe: impl HealthProbe + 'static) {
        *self.shared.probe.lock() = Some(Arc::new(probe));

        if self.shared.config.auto_recovery {
            let mut core = self.shared.core.lock();
            if core.state == CircuitState::Open && core.monitor.is_none() {
                core.monitor = Some(HealthMonitor::spawn(&self.shared));
            }
        }
    }

    /// Force the circuit closed and zero all counters.
    ///
    /// Intended for administrative recovery and test isolation; normal
    /// recovery goes through the half-open probe path.
    pub fn reset(&self) {
        let record = {
            let mut core = self.shared.core.lock();
            let record = if core.state == CircuitState::Closed {
                None
            } else {
                Some(BreakerShared::transition(
                    &self.shared,
                    &mut core,
                    CircuitState::Closed,
                ))
            };
            core.window.clear();
            core.consecutive_successes = 0;
            core.opened_at = None;
            core.counters = Counters::default();
            record
        };

        if let Some(record) = record {
            self.shared.sinks.dispatch(&record);
        }
    }

    /// Stop the health monitor; called when the breaker is removed from a
    /// registry so no timer outlives its owner.
    pub(crate) fn dispose(&self) {
        let monitor = self.shared.core.lock().monitor.take();
        if let Some(monitor) = monitor {
            monitor.stop();
        }
    }

    /// Run a guarded operation.
    ///
    /// The single public entry point of the state machine: consults the
    /// circuit state (fast-failing while open), runs the operation under
    /// the configured deadline, and records the outcome. Errors propagate
    /// unchanged; see [`Breaker::execute_with_fallback`] for the variant
    /// that can suppress them.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> BreakerResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BreakerResult<T>>,
    {
        let admitted = {
            let mut core = self.shared.core.lock();
            self.admit(&mut core)
        };

        match admitted {
            Ok(Some(record)) => self.shared.sinks.dispatch(&record),
            Ok(None) => {}
            Err(error) => return Err(error),
        }

        // The operation runs outside the critical section; a slow call can
        // never block other callers from observing or changing state.
        let started = Instant::now();
        let outcome = time::timeout(self.shared.config.timeout, operation()).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(value)) => {
                let record = {
                    let mut core = self.shared.core.lock();
                    self.on_success(&mut core)
                };
                if let Some(record) = record {
                    self.shared.sinks.dispatch(&record);
                }
                debug!(breaker = %self.shared.name, ?elapsed, "guarded call succeeded");
                Ok(value)
            }
            Ok(Err(error)) => {
                let record = {
                    let mut core = self.shared.core.lock();
                    self.on_failure(&mut core, error.summary(), false)
                };
                if let Some(record) = record {
                    self.shared.sinks.dispatch(&record);
                }
                debug!(breaker = %self.shared.name, %error, ?elapsed, "guarded call failed");
                Err(error)
            }
            Err(_elapsed) => {
                let duration = self.shared.config.timeout;
                let error = BreakerError::timeout(duration);
                let record = {
                    let mut core = self.shared.core.lock();
                    self.on_failure(&mut core, error.summary(), true)
                };
                if let Some(record) = record {
                    self.shared.sinks.dispatch(&record);
                }
                warn!(breaker = %self.shared.name, ?duration, "guarded call exceeded deadline");
                Err(error)
            }
        }
    }

    /// Run a guarded operation, resolving rejections and failures through
    /// `fallback`.
    ///
    /// A successful result is always returned as-is. Fallback presence is
    /// the only way an error is suppressed from the caller.
    pub async fn execute_with_fallback<T, F, Fut, B>(
        &self,
        operation: F,
        fallback: &B,
    ) -> BreakerResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BreakerResult<T>>,
        B: Fallback<T> + ?Sized,
    {
        match self.execute(operation).await {
            Ok(value) => Ok(value),
            Err(error) if fallback.handles(&error) => {
                debug!(breaker = %self.shared.name, %error, "resolving via fallback");
                fallback.recover(error).await
            }
            Err(error) => Err(error),
        }
    }

    /// Admission check, run under the lock before the operation.
    ///
    /// `Ok(Some(_))` carries an open → half-open transition record for the
    /// caller to dispatch once the lock is released.
    fn admit(&self, core: &mut BreakerCore) -> BreakerResult<Option<TransitionRecord>> {
        core.counters.total_requests += 1;

        match core.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(None),
            CircuitState::Open => {
                let now = Instant::now();
                let opened_at = core.opened_at.unwrap_or(core.last_state_change);
                let elapsed = now.duration_since(opened_at);

                if elapsed >= self.shared.config.reset_timeout {
                    Ok(Some(BreakerShared::transition(
                        &self.shared,
                        core,
                        CircuitState::HalfOpen,
                    )))
                } else {
                    core.counters.rejected_requests += 1;
                    let retry_after = self
                        .shared
                        .config
                        .reset_timeout
                        .checked_sub(elapsed)
                        .unwrap_or(Duration::ZERO);
                    debug!(
                        breaker = %self.shared.name,
                        ?retry_after,
                        "circuit open, call rejected"
                    );
                    Err(BreakerError::CircuitOpen {
                        name: self.shared.name.clone(),
                        retry_after: Some(retry_after),
                    })
                }
            }
        }
    }

    fn on_success(&self, core: &mut BreakerCore) -> Option<TransitionRecord> {
        let now = Instant::now();
        core.counters.successful_requests += 1;
        core.consecutive_successes += 1;

        let record = if core.state == CircuitState::HalfOpen
            && core.consecutive_successes >= self.shared.config.success_threshold
        {
            Some(BreakerShared::transition(
                &self.shared,
                core,
                CircuitState::Closed,
            ))
        } else {
            None
        };

        core.window.prune(now);
        record
    }

    fn on_failure(
        &self,
        core: &mut BreakerCore,
        summary: String,
        timed_out: bool,
    ) -> Option<TransitionRecord> {
        let now = Instant::now();
        core.counters.failed_requests += 1;
        if timed_out {
            core.counters.timeouts += 1;
        }
        core.consecutive_successes = 0;
        core.window.record(now, summary);

        match core.state {
            CircuitState::Closed if self.trip_condition(core, now) => Some(
                BreakerShared::transition(&self.shared, core, CircuitState::Open),
            ),
            // A single failure during recovery re-opens the circuit:
            // recovery requires sustained success, regression only one
            // failure.
            CircuitState::HalfOpen => Some(BreakerShared::transition(
                &self.shared,
                core,
                CircuitState::Open,
            )),
            _ => None,
        }
    }

    /// Closed → open trip test: a burst of failures inside the window, or a
    /// degraded lifetime failure rate once enough requests were seen.
    /// Either trigger alone suffices.
    fn trip_condition(&self, core: &BreakerCore, now: Instant) -> bool {
        if core.window.recent_count(now) >= self.shared.config.failure_threshold {
            return true;
        }

        let counters = &core.counters;
        counters.total_requests >= MIN_RATE_SAMPLES
            && counters.failed_requests as f64 / counters.total_requests as f64
                >= self.shared.config.failure_rate_threshold
    }
}
