//! Fallback strategies for graceful degradation
//!
//! A fallback is consulted when a guarded call is rejected (circuit open)
//! or fails; it is the only mechanism that suppresses error propagation to
//! the caller.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::core::{BreakerError, BreakerResult};

/// Strategy for producing a substitute value from a failed guarded call.
#[async_trait]
pub trait Fallback<T>: Send + Sync {
    /// Produce a value from the triggering error.
    async fn recover(&self, error: BreakerError) -> BreakerResult<T>;

    /// Whether this fallback should be attempted for the given error.
    ///
    /// Configuration errors are caller bugs, not dependency failures, and
    /// are never masked by default.
    fn handles(&self, error: &BreakerError) -> bool {
        !matches!(
            error,
            BreakerError::InvalidConfig { .. } | BreakerError::ConfigConflict { .. }
        )
    }
}

/// Constant-value fallback.
pub struct ValueFallback<T: Clone + Send + Sync> {
    value: T,
}

impl<T: Clone + Send + Sync> ValueFallback<T> {
    /// Create a fallback that always yields `value`.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Fallback<T> for ValueFallback<T> {
    async fn recover(&self, _error: BreakerError) -> BreakerResult<T> {
        Ok(self.value.clone())
    }
}

/// Fallback computed from the triggering error.
pub struct FnFallback<T, F, Fut>
where
    F: Fn(BreakerError) -> Fut + Send + Sync,
    Fut: Future<Output = BreakerResult<T>> + Send,
{
    function: F,
    _marker: PhantomData<fn() -> (T, Fut)>,
}

impl<T, F, Fut> FnFallback<T, F, Fut>
where
    F: Fn(BreakerError) -> Fut + Send + Sync,
    Fut: Future<Output = BreakerResult<T>> + Send,
{
    /// Create a fallback that invokes `function` with the triggering error.
    pub fn new(function: F) -> Self {
        Self {
            function,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> Fallback<T> for FnFallback<T, F, Fut>
where
    T: Send + Sync,
    F: Fn(BreakerError) -> Fut + Send + Sync,
    Fut: Future<Output = BreakerResult<T>> + Send,
{
    async fn recover(&self, error: BreakerError) -> BreakerResult<T> {
        (self.function)(error).await
    }
}
