//! Cache Sweep Task
//!
//! Background task that periodically expires stale cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::Cache;

/// Spawns a background task that runs [`Cache::garbage_collection`] every
/// `interval`, starting one interval from now.
///
/// The task only holds a weak reference, so it exits on its own once the
/// cache is dropped. The returned handle can also be aborted directly.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::new(backend, CacheSettings::default()));
/// let handle = spawn_sweep_task(Arc::downgrade(&cache), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Weak<Cache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache sweep task with interval of {:?}", interval);

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping sweep task");
                break;
            };

            info!("---------- Garbage Collection ----------");
            let removed = cache.garbage_collection().await;

            if removed > 0 {
                info!("Cache sweep: expired {} stale entries", removed);
            } else {
                debug!("Cache sweep: no stale entries found");
            }
        }
    })
}
