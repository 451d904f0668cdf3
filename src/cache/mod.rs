//! Cache Module
//!
//! Provides the concurrent in-memory store with lazy and eager TTL expiration.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CachedItem;
pub use stats::CacheStats;
pub use store::CacheStore;

pub(crate) use store::StoreState;
