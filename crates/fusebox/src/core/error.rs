//! Error types for guarded operations

use std::error::Error as StdError;
use std::time::Duration;

/// Maximum length of the error summary stored in a breaker's failure log.
const MAX_SUMMARY_LEN: usize = 256;

/// Errors surfaced by a breaker to the caller of `execute`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BreakerError {
    /// The circuit is open and the reset timeout has not yet elapsed;
    /// the guarded operation was not invoked.
    #[error("circuit '{name}' is open")]
    CircuitOpen {
        /// Name of the rejecting breaker.
        name: String,
        /// Time remaining until the next half-open probe is allowed.
        retry_after: Option<Duration>,
    },

    /// The guarded operation exceeded the per-call deadline.
    ///
    /// Distinct from [`BreakerError::Operation`]: the operation may still
    /// be running, the breaker merely stopped waiting for it.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// The deadline that was exceeded.
        duration: Duration,
    },

    /// The guarded operation failed on its own terms.
    #[error("{message}")]
    Operation {
        /// Human-readable failure description.
        message: String,
        /// Underlying error, when one was captured.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// A fallback was consulted and failed as well.
    #[error("fallback failed: {reason}")]
    FallbackFailed {
        /// Reason the fallback could not produce a value.
        reason: String,
        /// The error that triggered the fallback in the first place.
        #[source]
        source: Option<Box<BreakerError>>,
    },

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Validation failure details.
        message: String,
    },

    /// A registry lookup supplied a configuration that differs from the
    /// one the named breaker was created with.
    #[error("breaker '{name}' already exists with a different configuration")]
    ConfigConflict {
        /// Name of the conflicting breaker.
        name: String,
    },
}

impl BreakerError {
    /// Create an operation failure from a message.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failure wrapping an underlying error.
    pub fn operation_with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Operation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout failure.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error is a fast-fail rejection (circuit open, operation
    /// never attempted).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Whether this error is a deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Time-until-retry hint, when the error carries one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short description suitable for the breaker's failure log.
    ///
    /// Truncated so a pathological error message cannot bloat the window.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = self.to_string();
        if text.len() > MAX_SUMMARY_LEN {
            let cut = (0..=MAX_SUMMARY_LEN)
                .rev()
                .find(|i| text.is_char_boundary(*i))
                .unwrap_or(0);
            text.truncate(cut);
        }
        text
    }
}
