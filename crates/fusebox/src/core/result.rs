//! Result types and error conversion utilities

use std::fmt;

use super::error::BreakerError;

/// Result type for guarded operations.
pub type BreakerResult<T> = Result<T, BreakerError>;

/// Extension trait for converting foreign results into breaker results.
pub trait ResultExt<T> {
    /// Convert the error side into [`BreakerError::Operation`], keeping the
    /// original error as the source.
    fn into_breaker(self) -> BreakerResult<T>;

    /// Like [`ResultExt::into_breaker`], with a lazily-built context prefix.
    fn with_context<C, F>(self, f: F) -> BreakerResult<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_breaker(self) -> BreakerResult<T> {
        self.map_err(|e| BreakerError::Operation {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<C, F>(self, f: F) -> BreakerResult<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| BreakerError::Operation {
            message: format!("{}: {}", f(), e),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err() -> Result<(), std::io::Error> {
        Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no route to host",
        ))
    }

    #[test]
    fn into_breaker_wraps_foreign_errors() {
        let err = io_err().into_breaker().unwrap_err();
        assert!(matches!(err, BreakerError::Operation { .. }));
        assert_eq!(err.to_string(), "no route to host");
    }

    #[test]
    fn with_context_prefixes_message() {
        let err = io_err().with_context(|| "dialing inference api").unwrap_err();
        assert_eq!(err.to_string(), "dialing inference api: no route to host");
    }
}
