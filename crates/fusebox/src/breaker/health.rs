//! Background recovery probing for open circuits
//!
//! While a breaker is open (and `auto_recovery` is enabled), a monitor task
//! periodically invokes the registered probe. A passing probe moves the
//! breaker to half-open so live traffic can decide recovery; a failing probe
//! pushes `opened_at` forward, extending the open period by a full
//! `reset_timeout` from the failed probe.

use std::future::Future;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{BreakerShared, CircuitState};

/// Asynchronous recovery probe, registered once per breaker.
///
/// The probe answers a single question: does the dependency look healthy
/// right now? It carries no payload and its failures never reach callers of
/// `execute`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe the dependency once.
    async fn check(&self) -> bool;
}

/// Closures returning a boolean future are probes.
#[async_trait]
impl<F, Fut> HealthProbe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn check(&self) -> bool {
        self().await
    }
}

/// Handle to a running monitor task.
///
/// Stopped whenever the breaker leaves the open state by any path, and on
/// disposal; the task itself holds only a weak reference to the breaker, so
/// a dropped breaker is never kept alive by its own timer.
#[derive(Debug)]
pub(crate) struct HealthMonitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    pub(crate) fn spawn(shared: &Arc<BreakerShared>) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(monitor_loop(Arc::downgrade(shared), token.clone()));
        Self { token, handle }
    }

    pub(crate) fn stop(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

async fn monitor_loop(weak: Weak<BreakerShared>, token: CancellationToken) {
    let period = match weak.upgrade() {
        Some(shared) => shared.config.health_check_interval,
        None => return,
    };

    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so probing starts one
    // full period after the circuit opened.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(shared) = weak.upgrade() else { break };
        let Some(probe) = shared.probe.lock().clone() else { break };

        let healthy = probe.check().await;

        let record = {
            let mut core = shared.core.lock();
            if core.state != CircuitState::Open {
                // Left open through live traffic while the probe was in
                // flight; the transition already cancelled this task.
                break;
            }
            if healthy {
                Some(BreakerShared::transition(
                    &shared,
                    &mut core,
                    CircuitState::HalfOpen,
                ))
            } else {
                core.opened_at = Some(Instant::now());
                None
            }
        };

        match record {
            Some(record) => {
                shared.sinks.dispatch(&record);
                break;
            }
            None => {
                debug!(
                    breaker = %shared.name,
                    "health probe failed, open period extended"
                );
            }
        }
    }
}
