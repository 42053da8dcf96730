//! Named factory and cache of breaker instances
//!
//! A process typically owns one registry per group of guarded dependencies.
//! Pre-configured breakers are registered at process start via
//! [`BreakerRegistry::with_breakers`]; everything else is created lazily on
//! first lookup. At most one breaker exists per name.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::breaker::Breaker;
use crate::core::{BreakerConfig, BreakerError, BreakerResult, MetricsSnapshot};
use crate::observability::{EventSink, EventSinks};

/// Process-local map from dependency name to breaker.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Breaker>,
    sinks: EventSinks,
}

impl BreakerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an event sink inherited by every breaker created afterwards.
    ///
    /// Call before any breakers are created; already-created breakers keep
    /// the sinks they were built with.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks = self.sinks.with_sink(sink);
        self
    }

    /// Pre-populate named breakers at construction time.
    ///
    /// The registry replacement for module-level singleton breakers:
    /// callers depend on the registry, never on hidden globals.
    pub fn with_breakers<I, N>(self, entries: I) -> BreakerResult<Self>
    where
        I: IntoIterator<Item = (N, BreakerConfig)>,
        N: Into<String>,
    {
        for (name, config) in entries {
            let name = name.into();
            let breaker = Breaker::with_sinks(name.clone(), config, self.sinks.clone())?;
            self.breakers.insert(name, breaker);
        }
        Ok(self)
    }

    /// Return the breaker for `name`, creating it with `config` if absent.
    ///
    /// Creation is atomic: concurrent callers racing on the same name
    /// observe the same instance. A breaker's configuration is fixed at
    /// first creation: calling again with a *different* config returns
    /// [`BreakerError::ConfigConflict`] rather than silently ignoring the
    /// caller's intent; reconfiguring requires [`BreakerRegistry::remove`]
    /// followed by re-creation.
    pub fn get_or_create(&self, name: &str, config: BreakerConfig) -> BreakerResult<Breaker> {
        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let breaker = entry.get();
                if breaker.config() == &config {
                    Ok(breaker.clone())
                } else {
                    Err(BreakerError::ConfigConflict {
                        name: name.to_string(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                debug!(breaker = name, "creating breaker");
                let breaker = Breaker::with_sinks(name, config, self.sinks.clone())?;
                entry.insert(breaker.clone());
                Ok(breaker)
            }
        }
    }

    /// Return the breaker for `name`, if one exists.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Breaker> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Remove the breaker for `name`, stopping its health monitor first so
    /// no background timer outlives the entry.
    pub fn remove(&self, name: &str) -> Option<Breaker> {
        self.breakers.remove(name).map(|(_, breaker)| {
            breaker.dispose();
            debug!(breaker = name, "breaker removed");
            breaker
        })
    }

    /// Force every breaker to closed with zeroed counters.
    ///
    /// Used for test isolation and administrative recovery.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    /// Read-only metrics snapshot of every registered breaker.
    #[must_use]
    pub fn all_metrics(&self) -> Vec<MetricsSnapshot> {
        self.breakers
            .iter()
            .map(|entry| entry.value().metrics())
            .collect()
    }

    /// Names of all registered breakers.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of registered breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether the registry holds no breakers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.len())
            .finish_non_exhaustive()
    }
}
