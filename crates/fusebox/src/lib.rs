//! # Fusebox
//!
//! A per-dependency circuit-breaker engine for guarding calls to unreliable
//! remote services (an email API, an AI inference endpoint, a database
//! tier) against cascading failure.
//!
//! ## Features
//!
//! - **Circuit breaking**: per-dependency state machine that fails fast
//!   once a dependency looks unhealthy
//! - **Dual trip conditions**: bursty failures inside a sliding window, or
//!   a degraded lifetime failure rate
//! - **Deadline enforcement**: every guarded call runs under a per-call
//!   timeout, counted as its own failure cause
//! - **Background recovery**: optional health probe that moves an open
//!   circuit to half-open without waiting for live traffic
//! - **Fallbacks**: constant or error-derived substitute values
//! - **Registry**: named get-or-create cache with bulk reset and metrics
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use fusebox::{Breaker, BreakerConfig, BreakerError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BreakerConfig::new()
//!         .with_failure_threshold(3)
//!         .with_reset_timeout(Duration::from_secs(5))
//!         .with_timeout(Duration::from_secs(2));
//!     let breaker = Breaker::new("billing-api", config)?;
//!
//!     let reply = breaker
//!         .execute(|| async { Ok::<_, BreakerError>("ok") })
//!         .await?;
//!     assert_eq!(reply, "ok");
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core module with fundamental types
pub mod core;

// The state machine and its owned components
pub mod breaker;

// Higher-level surface
pub mod fallback;
pub mod observability;
pub mod registry;

// Public API - core types
pub use crate::core::{BreakerConfig, BreakerError, BreakerResult, MetricsSnapshot, ResultExt};

// Public API - state machine
pub use crate::breaker::{Breaker, CircuitState, FailureRecord, HealthProbe};

// Public API - fallbacks and observability
pub use crate::fallback::{Fallback, FnFallback, ValueFallback};
pub use crate::observability::{
    EventSink, EventSinks, LogSink, MemorySink, SinkError, TransitionRecord,
};

// Public API - registry
pub use crate::registry::BreakerRegistry;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::breaker::{Breaker, CircuitState, HealthProbe};
    pub use crate::core::{BreakerConfig, BreakerError, BreakerResult};
    pub use crate::fallback::Fallback;
    pub use crate::registry::BreakerRegistry;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
