//! Error types for the store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the store.
///
/// Missing or expired keys are not errors; they surface as `None` from
/// [`CacheStore::get`](crate::CacheStore::get).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Store construction rejected (zero sweep interval, no runtime, bad config)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed argument to a store operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Write attempted after the store was closed
    #[error("Store is closed")]
    StoreClosed,
}

// == Result Type Alias ==
/// Convenience Result type for the store.
pub type Result<T> = std::result::Result<T, CacheError>;
