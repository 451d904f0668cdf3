//! TTL Sweeper Task
//!
//! Background task that periodically removes expired entries from one store.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::StoreState;

/// Spawns the sweeper for a store on the given runtime.
///
/// Each tick captures the current instant once and removes every entry
/// expired relative to it. The task stops when `shutdown_rx` observes `true`
/// or its sender is dropped; shutdown wins over a tick that is ready at the
/// same time.
///
/// # Arguments
/// * `runtime` - Runtime the task is spawned on
/// * `state` - Shared map and counters of the owning store
/// * `interval` - Time between sweeps, must be non-zero
/// * `shutdown_rx` - Cancellation signal owned by the store
pub(crate) fn spawn_sweeper<K, V>(
    runtime: &Handle,
    state: Arc<StoreState<K, V>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    runtime.spawn(async move {
        debug!("Starting sweeper with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; sweeps start one interval in
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let removed = state.purge_expired(Instant::now());
                    state.stats.record_sweep();

                    if removed > 0 {
                        info!("TTL sweep: removed {} expired entries", removed);
                    } else {
                        debug!("TTL sweep: no expired entries found");
                    }
                }
            }
        }

        debug!("Sweeper stopped");
    })
}
