//! Per-breaker configuration and validation

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::BreakerError;
use super::result::BreakerResult;

/// Tunables for one breaker, fixed at construction.
///
/// Changing a live breaker's configuration is not supported; remove it from
/// the registry and create a new one instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Number of failures inside `failure_window` that trips the circuit.
    pub failure_threshold: usize,

    /// Lifetime failure rate (failed / total, 0.0–1.0) that trips the
    /// circuit once enough requests have been observed.
    pub failure_rate_threshold: f64,

    /// Duration over which failures are counted toward `failure_threshold`.
    #[cfg_attr(feature = "humantime", serde(with = "humantime_serde"))]
    pub failure_window: Duration,

    /// Minimum time spent open before a half-open probe is allowed.
    #[cfg_attr(feature = "humantime", serde(with = "humantime_serde"))]
    pub reset_timeout: Duration,

    /// Consecutive successes in half-open required to close the circuit.
    pub success_threshold: u64,

    /// Per-call deadline; exceeding it counts as a failure.
    #[cfg_attr(feature = "humantime", serde(with = "humantime_serde"))]
    pub timeout: Duration,

    /// Period between background health probes while open.
    #[cfg_attr(feature = "humantime", serde(with = "humantime_serde"))]
    pub health_check_interval: Duration,

    /// Whether the background health probe runs while the circuit is open.
    pub auto_recovery: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate_threshold: 0.5,
            failure_window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
            timeout: Duration::from_secs(10),
            health_check_interval: Duration::from_secs(5),
            auto_recovery: true,
        }
    }
}

impl BreakerConfig {
    /// Create a configuration with the default tunables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the in-window failure count that trips the circuit.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the lifetime failure rate (0.0–1.0) that trips the circuit.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// Set the failure-counting window.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }

    /// Set the minimum open duration before a half-open probe.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Set the consecutive successes required to close from half-open.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_success_threshold(mut self, threshold: u64) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the per-call deadline.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the background probe period.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Enable or disable background recovery probing.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_auto_recovery(mut self, enabled: bool) -> Self {
        self.auto_recovery = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> BreakerResult<()> {
        if self.failure_threshold == 0 {
            return Err(BreakerError::invalid_config(
                "failure_threshold must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.failure_rate_threshold) {
            return Err(BreakerError::invalid_config(
                "failure_rate_threshold must be between 0.0 and 1.0",
            ));
        }

        if self.failure_window.is_zero() {
            return Err(BreakerError::invalid_config(
                "failure_window must be greater than 0",
            ));
        }

        if self.reset_timeout.is_zero() {
            return Err(BreakerError::invalid_config(
                "reset_timeout must be greater than 0",
            ));
        }

        if self.success_threshold == 0 {
            return Err(BreakerError::invalid_config(
                "success_threshold must be greater than 0",
            ));
        }

        if self.timeout.is_zero() {
            return Err(BreakerError::invalid_config(
                "timeout must be greater than 0",
            ));
        }

        if self.health_check_interval.is_zero() {
            return Err(BreakerError::invalid_config(
                "health_check_interval must be greater than 0",
            ));
        }

        Ok(())
    }
}
