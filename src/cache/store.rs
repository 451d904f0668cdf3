//! Cache Store Module
//!
//! Main store engine combining a sharded concurrent map with lazy and eager
//! TTL expiration.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::stats::StatsCounters;
use crate::cache::{CacheStats, CachedItem};
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweeper;

// == Store State ==
/// Map and counters shared between the store handle and its sweeper.
pub(crate) struct StoreState<K, V> {
    pub(crate) items: DashMap<K, CachedItem<V>>,
    pub(crate) stats: StatsCounters,
}

impl<K, V> StoreState<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            items: DashMap::new(),
            stats: StatsCounters::default(),
        }
    }

    /// Removes every entry expired relative to `now`.
    ///
    /// `DashMap::retain` write-locks one shard at a time, so foreground
    /// callers only ever wait on the shard currently being scanned.
    pub(crate) fn purge_expired(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.items.retain(|_, item| {
            if item.is_expired_at(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        self.stats.record_expired(removed);
        removed
    }

    /// Removes `key` only if it still holds an entry expired at `now`.
    ///
    /// A value written by a concurrent `set` after the expired read is kept.
    fn remove_if_expired<Q>(&self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self
            .items
            .remove_if(key, |_, item| item.is_expired_at(now))
            .is_some();

        if removed {
            self.stats.record_expired(1);
        }
        removed
    }
}

// == Cache Store ==
/// Thread-safe in-memory key-value store with per-entry TTL.
///
/// Every store owns its own background sweeper, started on the Tokio runtime
/// that is current at construction time. Expired entries are dropped lazily
/// when touched by [`get`](Self::get) or [`iterate`](Self::iterate), and
/// eagerly by the sweeper once per sweep interval.
///
/// Share a store between tasks or threads by wrapping it in an `Arc`. Values
/// are cloned out on read; wrap large values in an `Arc` as well.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use ttl_store::CacheStore;
///
/// #[tokio::main]
/// async fn main() -> ttl_store::Result<()> {
///     let store = CacheStore::new(Duration::from_secs(1))?;
///     store.set("a3f5".to_string(), "payload".to_string(), Duration::from_secs(30))?;
///     assert_eq!(store.get("a3f5"), Some("payload".to_string()));
///     store.close().await;
///     Ok(())
/// }
/// ```
pub struct CacheStore<K, V> {
    /// Entries and counters, shared with the sweeper
    state: Arc<StoreState<K, V>>,
    /// Interval between sweeper passes
    sweep_interval: Duration,
    /// Set once by close; writers hold the read lock across their insert
    closed: RwLock<bool>,
    /// Signals the sweeper to stop; dropping it stops the sweeper as well
    shutdown_tx: watch::Sender<bool>,
    /// Sweeper task handle; close holds the lock until shutdown completes
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a store that sweeps expired entries every `sweep_interval`.
    ///
    /// # Errors
    /// [`CacheError::InvalidConfiguration`] if the interval is zero or no
    /// Tokio runtime is available to run the sweeper.
    pub fn new(sweep_interval: Duration) -> Result<Self> {
        Self::with_config(StoreConfig::new().with_sweep_interval(sweep_interval))
    }

    /// Creates a store from a [`StoreConfig`].
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Handle::try_current().map_err(|_| {
            CacheError::InvalidConfiguration(
                "a Tokio runtime is required to run the sweeper".to_string(),
            )
        })?;

        let state = Arc::new(StoreState::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = spawn_sweeper(
            &runtime,
            Arc::clone(&state),
            config.sweep_interval,
            shutdown_rx,
        );

        info!(
            "Cache store created with sweep interval of {:?}",
            config.sweep_interval
        );

        Ok(Self {
            state,
            sweep_interval: config.sweep_interval,
            closed: RwLock::new(false),
            shutdown_tx,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` if the key is absent, expired, or the store is closed.
    /// An expired entry found here is removed.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.is_closed() {
            self.state.stats.record_miss();
            return None;
        }

        let now = Instant::now();
        let value = match self.state.items.get(key) {
            Some(item) if item.is_expired_at(now) => {
                // Release the shard read lock before removing
                drop(item);
                if self.state.remove_if_expired(key, now) {
                    debug!("Lazily removed expired entry on get");
                }
                None
            }
            Some(item) => Some(item.value.clone()),
            None => None,
        };

        match value {
            Some(_) => self.state.stats.record_hit(),
            None => self.state.stats.record_miss(),
        }
        value
    }

    // == Set ==
    /// Stores a value under `key`, replacing any previous value and TTL.
    ///
    /// A zero `ttl` stores the value permanently.
    ///
    /// # Errors
    /// - [`CacheError::StoreClosed`] after [`close`](Self::close)
    /// - [`CacheError::InvalidArgument`] if `ttl` overflows the clock
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        let item = CachedItem::new(value, ttl)?;

        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(CacheError::StoreClosed);
        }
        self.state.items.insert(key, item);
        drop(closed);

        Ok(())
    }

    // == Iterate ==
    /// Visits every live entry until `visit` returns false.
    ///
    /// The visit runs over a snapshot taken at call time with no internal
    /// lock held, so `visit` may call back into the store. Entries added
    /// concurrently may or may not be seen. Expired entries met during the
    /// scan are removed. Visit order is unspecified.
    pub fn iterate<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        if self.is_closed() {
            return;
        }

        let now = Instant::now();
        let mut live = Vec::new();
        let mut expired = Vec::new();

        for entry in self.state.items.iter() {
            if entry.value().is_expired_at(now) {
                expired.push(entry.key().clone());
            } else {
                live.push((entry.key().clone(), entry.value().value.clone()));
            }
        }

        for key in &expired {
            self.state.remove_if_expired(key, now);
        }

        for (key, value) in &live {
            if !visit(key, value) {
                break;
            }
        }
    }

    // == Remove Key ==
    /// Removes an entry regardless of its expiration state.
    ///
    /// Removing an absent key is a no-op. Returns true if an entry was removed.
    pub fn remove_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.items.remove(key).is_some()
    }

    // == Purge Expired ==
    /// Runs one eager expiration pass immediately.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        self.state.purge_expired(Instant::now())
    }

    // == Close ==
    /// Stops the sweeper, waits for it to exit, then clears every entry.
    ///
    /// Idempotent. Afterwards `set` fails with [`CacheError::StoreClosed`]
    /// and reads behave as on an empty store.
    pub async fn close(&self) {
        // Held until the map is cleared so every caller returns only after
        // shutdown has fully completed
        let mut sweeper = self.sweeper.lock().await;

        {
            let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return;
            }
            *closed = true;
        }

        // Receiver may already be gone if the sweeper died; nothing to signal then
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = sweeper.take() {
            if let Err(err) = handle.await {
                warn!("Sweeper task ended abnormally: {}", err);
            }
        }

        let cleared = self.state.items.len();
        self.state.items.clear();
        info!("Cache store closed, cleared {} entries", cleared);
    }

    // == Accessors ==
    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the configured sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Returns the current number of entries, including expired ones not yet
    /// reclaimed.
    pub fn len(&self) -> usize {
        self.state.items.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state.items.is_empty()
    }

    /// Returns a snapshot of store statistics.
    pub fn stats(&self) -> CacheStats {
        self.state.stats.snapshot(self.state.items.len())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn new_store() -> CacheStore<String, String> {
        CacheStore::new(Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_store_new() {
        let store = new_store();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert!(!store.is_closed());
        assert_eq!(store.sweep_interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_store_zero_interval_rejected() {
        let result = CacheStore::<String, String>::new(Duration::ZERO);
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_store_requires_runtime() {
        let result = CacheStore::<String, String>::new(Duration::from_secs(1));
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = new_store();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::from_secs(60))
            .unwrap();

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = new_store();
        assert_eq!(store.get("nonexistent"), None);
    }

    #[tokio::test]
    async fn test_store_overwrite_replaces_ttl() {
        let store = new_store();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::from_secs(1))
            .unwrap();
        store
            .set("key1".to_string(), "value2".to_string(), Duration::ZERO)
            .unwrap();

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);

        let item = store.state.items.get("key1").unwrap();
        assert!(item.is_permanent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_lazy_expiration_on_get() {
        let store = CacheStore::new(Duration::from_secs(3600)).unwrap();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::from_millis(500))
            .unwrap();
        assert!(store.get("key1").is_some());

        tokio::time::advance(Duration::from_millis(600)).await;

        assert_eq!(store.get("key1"), None);
        // Removed as a side effect of the read, without any sweep
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_iterate_skips_and_removes_expired() {
        let store = CacheStore::new(Duration::from_secs(3600)).unwrap();

        store
            .set("short".to_string(), "a".to_string(), Duration::from_secs(1))
            .unwrap();
        store
            .set("long".to_string(), "b".to_string(), Duration::from_secs(60))
            .unwrap();
        store
            .set("forever".to_string(), "c".to_string(), Duration::ZERO)
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        let mut seen = Vec::new();
        store.iterate(|key, value| {
            seen.push((key.clone(), value.clone()));
            true
        });
        seen.sort();

        assert_eq!(
            seen,
            vec![
                ("forever".to_string(), "c".to_string()),
                ("long".to_string(), "b".to_string()),
            ]
        );
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_store_iterate_stops_early() {
        let store = new_store();
        for i in 0..10 {
            store
                .set(format!("key{}", i), format!("value{}", i), Duration::ZERO)
                .unwrap();
        }

        let mut visited = 0;
        store.iterate(|_, _| {
            visited += 1;
            visited < 3
        });

        assert_eq!(visited, 3);
        assert_eq!(store.len(), 10);
    }

    #[tokio::test]
    async fn test_store_iterate_callback_may_reenter() {
        let store = new_store();
        for i in 0..5 {
            store
                .set(format!("key{}", i), "value".to_string(), Duration::ZERO)
                .unwrap();
        }

        store.iterate(|key, _| {
            store.remove_key(key);
            true
        });

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_remove_key() {
        let store = new_store();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::ZERO)
            .unwrap();

        assert!(store.remove_key("key1"));
        assert!(!store.remove_key("key1"));
        assert!(!store.remove_key("never_set"));
        assert_eq!(store.get("key1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purge_expired() {
        let store = CacheStore::new(Duration::from_secs(3600)).unwrap();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::from_secs(1))
            .unwrap();
        store
            .set("key2".to_string(), "value2".to_string(), Duration::from_secs(10))
            .unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("key2").is_some());
    }

    #[tokio::test]
    async fn test_store_ttl_overflow_leaves_store_unmodified() {
        let store = new_store();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::ZERO)
            .unwrap();
        let result = store.set("key1".to_string(), "value2".to_string(), Duration::MAX);

        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
        assert_eq!(store.get("key1"), Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_store_close_clears_and_rejects_writes() {
        let store = new_store();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::ZERO)
            .unwrap();
        store.close().await;

        assert!(store.is_closed());
        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
        assert!(matches!(
            store.set("key2".to_string(), "value2".to_string(), Duration::ZERO),
            Err(CacheError::StoreClosed)
        ));
        assert!(!store.remove_key("key1"));

        // Second close is a no-op
        store.close().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_close_stops_sweeper() {
        let store = new_store();
        assert!(store.sweeper.lock().await.is_some());

        store.close().await;

        assert!(store.sweeper.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_store_concurrent_close_waits_for_clear() {
        let store = Arc::new(new_store());
        for i in 0..10 {
            store
                .set(format!("key{}", i), "value".to_string(), Duration::ZERO)
                .unwrap();
        }

        let first = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                store.close().await;
                assert!(store.is_empty());
            }
        });
        // Let the first close start and park on the sweeper handle
        tokio::task::yield_now().await;

        store.close().await;
        assert_eq!(store.len(), 0);
        assert!(store.is_closed());

        first.await.unwrap();
    }

    #[tokio::test]
    async fn test_store_stats() {
        let store = new_store();

        store
            .set("key1".to_string(), "value1".to_string(), Duration::ZERO)
            .unwrap();
        store.get("key1"); // hit
        store.get("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }
}
