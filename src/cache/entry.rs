//! Cached Item Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{CacheError, Result};

// == Cached Item ==
/// A stored value together with its absolute expiration time.
#[derive(Debug, Clone)]
pub struct CachedItem<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant on the monotonic clock, None = never expires
    pub expires_at: Option<Instant>,
}

impl<V> CachedItem<V> {
    // == Constructor ==
    /// Creates a new cached item that expires `ttl` from now.
    ///
    /// A zero `ttl` makes the item permanent. Fails with
    /// [`CacheError::InvalidArgument`] if `now + ttl` is not representable.
    pub fn new(value: V, ttl: Duration) -> Result<Self> {
        Self::new_at(value, ttl, Instant::now())
    }

    pub(crate) fn new_at(value: V, ttl: Duration, now: Instant) -> Result<Self> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            let deadline = now.checked_add(ttl).ok_or_else(|| {
                CacheError::InvalidArgument(format!("ttl of {:?} overflows the clock", ttl))
            })?;
            Some(deadline)
        };

        Ok(Self { value, expires_at })
    }

    // == Is Expired ==
    /// Checks whether the item has expired relative to `now`.
    ///
    /// Boundary condition: an item is expired only once `now` is strictly
    /// past its deadline. Permanent items never expire.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    #[cfg(test)]
    fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns true if the item never expires.
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if the item never expires.
    ///
    /// Saturates at zero once the deadline has passed.
    #[cfg(test)]
    fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
