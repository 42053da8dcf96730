//! Observability surface for breaker state transitions
//!
//! The engine emits one [`TransitionRecord`] per state change to the
//! [`EventSink`]s attached at construction. Emission is fire-and-forget:
//! records are dispatched after the breaker's lock is released and sink
//! errors are contained (see [`hooks`]).

pub mod hooks;

pub use hooks::{EventSink, EventSinks, LogSink, MemorySink, SinkError, TransitionRecord};
