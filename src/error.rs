//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// Lookups never fail: a missing or expired key is reported as `None`.
/// Errors are reserved for conditions the caller has to fix.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache was built outside of a tokio runtime, so the per-shard
    /// expiration reapers cannot be spawned.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_runtime_message() {
        let err = CacheError::NoRuntime("must be called from the context of a Tokio runtime".to_string());
        assert!(err.to_string().starts_with("No tokio runtime available"));
    }
}
