//! TTL Store - An embeddable in-memory key-value store
//!
//! Every entry carries an optional expiration time. Expired entries are
//! dropped when they are read and by a per-store background sweeper.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{CacheStats, CacheStore, CachedItem};
pub use config::StoreConfig;
pub use error::{CacheError, Result};
