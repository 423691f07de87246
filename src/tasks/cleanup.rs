//! Cache Sweep Task
//!
//! Background task that periodically removes expired response cache
//! entries. Reads already evict lazily, so the sweep only bounds memory.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a background task that periodically removes expired entries.
///
/// The task runs in an infinite loop, sleeping for `interval` between
/// sweeps. It holds the cache write lock only for the sweep itself.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = cache::shared();
/// let sweep_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: SharedCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting cache sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let (removed, stats) = {
                let mut cache_guard = cache.write().await;
                let removed = cache_guard.cleanup_expired();
                (removed, cache_guard.stats())
            };

            if removed > 0 {
                info!(
                    removed,
                    entries = stats.total_entries,
                    hit_rate = stats.hit_rate(),
                    "Cache sweep removed expired entries"
                );
            } else {
                debug!(
                    entries = stats.total_entries,
                    hits = stats.hits,
                    misses = stats.misses,
                    "Cache sweep found no expired entries"
                );
            }
        }
    })
}
