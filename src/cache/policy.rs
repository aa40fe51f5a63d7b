//! Cache Policy Module
//!
//! Wraps a [`StorageBackend`] with TTL expiry, byte-size and element-count
//! admission limits, and a periodic sweep.
//!
//! The element counter is maintained only by this instance's own `store` and
//! `expire` calls. It is never re-derived from the backend, so concurrent
//! stores, double expiry, or a non-atomic backend enumeration can make it
//! drift from what the backend actually holds.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{current_timestamp_ms, CacheRecord, CachedBody};
use crate::storage::StorageBackend;
use crate::tasks::spawn_sweep_task;

/// Default entry lifetime in milliseconds
pub const DEFAULT_CACHE_DURATION_MS: u64 = 60_000;
/// Default largest cacheable body in bytes
pub const DEFAULT_CACHE_SIZE_BYTES: usize = 50_000;
/// Default maximum number of cached entries
pub const DEFAULT_CACHE_SIZE_ELEMENTS: usize = 50;

// == Cache Settings ==
/// Admission and expiry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub cache_duration_ms: u64,
    pub cache_size_bytes_max: usize,
    pub cache_size_elements_max: usize,
}

impl CacheSettings {
    /// Builds settings, replacing zero values with the defaults.
    pub fn new(
        cache_duration_ms: u64,
        cache_size_bytes_max: usize,
        cache_size_elements_max: usize,
    ) -> Self {
        Self {
            cache_duration_ms: non_zero_or(cache_duration_ms, DEFAULT_CACHE_DURATION_MS),
            cache_size_bytes_max: non_zero_or(cache_size_bytes_max, DEFAULT_CACHE_SIZE_BYTES),
            cache_size_elements_max: non_zero_or(
                cache_size_elements_max,
                DEFAULT_CACHE_SIZE_ELEMENTS,
            ),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_duration_ms: DEFAULT_CACHE_DURATION_MS,
            cache_size_bytes_max: DEFAULT_CACHE_SIZE_BYTES,
            cache_size_elements_max: DEFAULT_CACHE_SIZE_ELEMENTS,
        }
    }
}

fn non_zero_or<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

// == Cache ==
/// Response cache policy engine.
#[derive(Debug)]
pub struct Cache {
    /// Persistence layer
    backend: Arc<dyn StorageBackend>,
    /// Admission and expiry limits
    settings: CacheSettings,
    /// Best-effort entry count, may go negative on repeated expiry
    cached_elements: AtomicI64,
    /// Periodic sweep, if started
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Cache {
    // == Constructor ==
    /// Creates a cache without a background sweep.
    pub fn new(backend: Arc<dyn StorageBackend>, settings: CacheSettings) -> Self {
        Self {
            backend,
            settings,
            cached_elements: AtomicI64::new(0),
            sweeper: Mutex::new(None),
        }
    }

    /// Creates a cache, runs one sweep right away, then keeps sweeping every
    /// `sweep_interval` until the cache is dropped or [`Cache::stop_sweep`] is called.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(
        backend: Arc<dyn StorageBackend>,
        settings: CacheSettings,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        let cache = Arc::new(Self::new(backend, settings));
        cache.garbage_collection().await;

        let handle = spawn_sweep_task(Arc::downgrade(&cache), sweep_interval);
        if let Ok(mut sweeper) = cache.sweeper.lock() {
            *sweeper = Some(handle);
        }
        info!(
            "Cache started on {} backend (duration={}ms, max_bytes={}, max_elements={})",
            cache.backend.name(),
            settings.cache_duration_ms,
            settings.cache_size_bytes_max,
            settings.cache_size_elements_max
        );
        cache
    }

    // == Get ==
    /// Returns the stored body for `path` if present and fresh.
    ///
    /// An expired entry is expired on the spot and reported as a miss. Backend
    /// errors are logged and also reported as a miss.
    pub async fn get(&self, path: &str) -> Option<CachedBody> {
        if path.is_empty() {
            missing_path("get");
            return None;
        }

        let record = match self.backend.find(path).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                error!("Cache lookup for {} failed: {}", path, e);
                return None;
            }
        };

        if record.is_fresh_at(current_timestamp_ms()) {
            info!("Returning cached response for {}", path);
            return Some(record.body);
        }

        debug!("Cached response for {} has expired", path);
        self.expire(path).await;
        None
    }

    // == Store ==
    /// Offers a body for storage. Returns whether it was accepted.
    ///
    /// Rejected without any state change when the path, body or size is
    /// missing, when the element cap is reached, or when `size` exceeds the
    /// byte limit. Never evicts to make room.
    pub async fn store(&self, path: &str, body: CachedBody, size: usize) -> bool {
        if path.is_empty() {
            return missing_path("store");
        }

        if body.is_empty() || size == 0 {
            error!("Attempted to store {}, but body or size was missing", path);
            return false;
        }

        if self.cached_elements() >= self.element_cap() {
            warn!("Attempted to store {} but the cache is full", path);
            return false;
        }

        if size > self.settings.cache_size_bytes_max {
            warn!(
                "Attempted to store {} but the body size was too big ({} > {} bytes)",
                path, size, self.settings.cache_size_bytes_max
            );
            return false;
        }

        let record = CacheRecord::new(body, self.settings.cache_duration_ms);
        if let Err(e) = self.backend.insert(path, record).await {
            error!("Failed to store {}: {}", path, e);
            return false;
        }

        self.cached_elements.fetch_add(1, Ordering::SeqCst);
        info!("{} has been cached ({} bytes)", path, size);
        true
    }

    // == Expire ==
    /// Removes `path` and decrements the element counter.
    ///
    /// The counter is decremented even when nothing was stored under `path`.
    pub async fn expire(&self, path: &str) -> bool {
        if path.is_empty() {
            return missing_path("expire");
        }

        self.cached_elements.fetch_sub(1, Ordering::SeqCst);

        match self.backend.remove(path).await {
            Ok(()) => {
                debug!("Expired {}", path);
                true
            }
            Err(e) => {
                error!("Failed to expire {}: {}", path, e);
                false
            }
        }
    }

    // == Garbage Collection ==
    /// Expires every entry whose expiry has passed. Returns how many were expired.
    pub async fn garbage_collection(&self) -> usize {
        let now = current_timestamp_ms();
        let mut stale = Vec::new();

        self.backend
            .each(&mut |visited| match visited {
                Ok((path, record)) => {
                    if record.is_stale_at(now) {
                        stale.push(path);
                    }
                }
                Err(e) => error!("Garbage collection reported error: {}", e),
            })
            .await;

        let count = stale.len();
        for path in stale {
            self.expire(&path).await;
        }
        count
    }

    // == Stop Sweep ==
    /// Stops the periodic sweep. Safe to call more than once.
    pub fn stop_sweep(&self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(handle) = sweeper.take() {
                handle.abort();
                debug!("Cache sweep stopped");
            }
        }
    }

    // == Accessors ==
    /// Current value of the best-effort element counter.
    pub fn cached_elements(&self) -> i64 {
        self.cached_elements.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn element_cap(&self) -> i64 {
        i64::try_from(self.settings.cache_size_elements_max).unwrap_or(i64::MAX)
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.stop_sweep();
    }
}

fn missing_path(operation: &str) -> bool {
    error!("Cache {} called without a path", operation);
    false
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProxyError, Result};
    use crate::storage::InMemoryStorage;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::sleep;

    /// Backend whose every operation fails, as an unreachable Redis would.
    #[derive(Debug)]
    struct FailingStorage;

    fn unavailable() -> ProxyError {
        ProxyError::Internal("backend unavailable".to_string())
    }

    #[async_trait]
    impl StorageBackend for FailingStorage {
        async fn insert(&self, _key: &str, _record: CacheRecord) -> Result<()> {
            Err(unavailable())
        }

        async fn find(&self, _key: &str) -> Result<Option<CacheRecord>> {
            Err(unavailable())
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(unavailable())
        }

        async fn each(&self, visit: &mut (dyn FnMut(Result<(String, CacheRecord)>) + Send)) {
            visit(Err(unavailable()));
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn failing_cache() -> Cache {
        Cache::new(Arc::new(FailingStorage), scenario_settings())
    }

    fn scenario_settings() -> CacheSettings {
        CacheSettings::new(60_000, 10, 5)
    }

    fn cache_with(settings: CacheSettings) -> (Cache, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = Cache::new(storage.clone(), settings);
        (cache, storage)
    }

    #[test]
    fn test_settings_zero_values_use_defaults() {
        let settings = CacheSettings::new(0, 0, 0);
        assert_eq!(settings, CacheSettings::default());

        let settings = CacheSettings::new(1, 2, 3);
        assert_eq!(settings.cache_duration_ms, 1);
        assert_eq!(settings.cache_size_bytes_max, 2);
        assert_eq!(settings.cache_size_elements_max, 3);
    }

    #[tokio::test]
    async fn test_caching_scenario() {
        let (cache, _) = cache_with(scenario_settings());

        assert!(cache.store("test1", CachedBody::from("body1"), 10).await);
        assert_eq!(cache.cached_elements(), 1);

        assert_eq!(cache.get("test1").await, Some(CachedBody::from("body1")));

        assert!(cache.expire("test1").await);
        assert_eq!(cache.cached_elements(), 0);

        assert!(!cache.store("test1", CachedBody::from("body1"), 15).await);
        assert_eq!(cache.cached_elements(), 0);

        assert!(cache.store("test1", CachedBody::from("body1"), 5).await);
        assert!(cache.store("test2", CachedBody::from("body2"), 9).await);
        assert!(cache.store("test3", CachedBody::from("body3"), 1).await);
        assert!(cache.store("test4", CachedBody::from("body4"), 3).await);
        assert!(cache.store("test5", CachedBody::from("body5"), 8).await);
        assert_eq!(cache.cached_elements(), 5);

        assert!(!cache.store("test6", CachedBody::from("body6"), 6).await);
        assert_eq!(cache.cached_elements(), 5);
        assert_eq!(cache.get("test6").await, None);
    }

    #[tokio::test]
    async fn test_store_rejects_missing_arguments() {
        let (cache, storage) = cache_with(scenario_settings());

        assert!(!cache.store("", CachedBody::from("body"), 4).await);
        assert!(!cache.store("/a", CachedBody::from(""), 4).await);
        assert!(!cache.store("/a", CachedBody::from("body"), 0).await);

        assert_eq!(cache.cached_elements(), 0);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_oversized_writes_nothing() {
        let (cache, storage) = cache_with(scenario_settings());

        assert!(!cache.store("/big", CachedBody::from("x"), 11).await);
        assert!(storage.find("/big").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_at_cap_does_not_evict() {
        let (cache, storage) = cache_with(CacheSettings::new(60_000, 100, 2));

        assert!(cache.store("/a", CachedBody::from("a"), 1).await);
        assert!(cache.store("/b", CachedBody::from("b"), 1).await);
        assert!(!cache.store("/c", CachedBody::from("c"), 1).await);

        assert_eq!(storage.len().await, 2);
        assert!(cache.get("/a").await.is_some());
        assert!(cache.get("/b").await.is_some());
        assert!(storage.find("/c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_empty_path_is_miss() {
        let (cache, _) = cache_with(scenario_settings());
        assert_eq!(cache.get("").await, None);
    }

    #[tokio::test]
    async fn test_get_unknown_path_is_miss() {
        let (cache, _) = cache_with(scenario_settings());
        assert_eq!(cache.get("/nothing").await, None);
        assert_eq!(cache.cached_elements(), 0);
    }

    #[tokio::test]
    async fn test_get_binary_body() {
        let (cache, _) = cache_with(scenario_settings());
        let png = CachedBody::Binary(vec![0x89, 0x50, 0x4e, 0x47]);

        assert!(cache.store("/logo.png", png.clone(), 4).await);
        assert_eq!(cache.get("/logo.png").await, Some(png));
    }

    #[tokio::test]
    async fn test_expired_get_decrements_once() {
        let (cache, storage) = cache_with(CacheSettings::new(20, 100, 5));

        assert!(cache.store("/a", CachedBody::from("a"), 1).await);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get("/a").await, None);
        assert_eq!(cache.cached_elements(), 0);
        assert!(storage.is_empty().await);

        // Already removed: a plain miss, no further decrement
        assert_eq!(cache.get("/a").await, None);
        assert_eq!(cache.cached_elements(), 0);
    }

    #[tokio::test]
    async fn test_expire_empty_path_rejected() {
        let (cache, _) = cache_with(scenario_settings());
        assert!(!cache.expire("").await);
        assert_eq!(cache.cached_elements(), 0);
    }

    #[tokio::test]
    async fn test_repeated_expire_undercounts() {
        let (cache, _) = cache_with(scenario_settings());

        assert!(cache.store("/a", CachedBody::from("a"), 1).await);
        assert!(cache.expire("/a").await);
        assert!(cache.expire("/a").await);

        assert_eq!(cache.cached_elements(), -1);
    }

    #[tokio::test]
    async fn test_garbage_collection_removes_only_stale() {
        let (cache, storage) = cache_with(CacheSettings::new(60_000, 100, 5));

        // Stored directly with an expiry in the past
        storage
            .insert(
                "/old",
                CacheRecord {
                    body: CachedBody::from("old"),
                    expires_at: current_timestamp_ms() - 1_000,
                },
            )
            .await
            .unwrap();
        assert!(cache.store("/new", CachedBody::from("new"), 3).await);

        let removed = cache.garbage_collection().await;

        assert_eq!(removed, 1);
        assert!(storage.find("/old").await.unwrap().is_none());
        assert_eq!(cache.get("/new").await, Some(CachedBody::from("new")));
    }

    #[tokio::test]
    async fn test_garbage_collection_after_duration() {
        let (cache, storage) = cache_with(CacheSettings::new(40, 100, 5));

        assert!(cache.store("/first", CachedBody::from("1"), 1).await);
        assert!(cache.store("/second", CachedBody::from("2"), 1).await);
        sleep(Duration::from_millis(80)).await;
        assert!(cache.store("/third", CachedBody::from("3"), 1).await);

        assert_eq!(cache.garbage_collection().await, 2);
        assert_eq!(cache.cached_elements(), 1);
        assert_eq!(storage.len().await, 1);
        assert!(storage.find("/third").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_start_sweeps_immediately() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .insert(
                "/leftover",
                CacheRecord {
                    body: CachedBody::from("x"),
                    expires_at: current_timestamp_ms() - 1,
                },
            )
            .await
            .unwrap();

        let cache = Cache::start(
            storage.clone(),
            scenario_settings(),
            Duration::from_secs(60),
        )
        .await;

        assert!(storage.is_empty().await);
        cache.stop_sweep();
        cache.stop_sweep();
    }

    #[tokio::test]
    async fn test_get_backend_failure_is_miss() {
        let cache = failing_cache();
        assert_eq!(cache.get("/page").await, None);
        assert_eq!(cache.cached_elements(), 0);
    }

    #[tokio::test]
    async fn test_store_backend_failure_leaves_counter() {
        let cache = failing_cache();
        assert!(!cache.store("/page", CachedBody::from("body"), 4).await);
        assert_eq!(cache.cached_elements(), 0);
    }

    #[tokio::test]
    async fn test_garbage_collection_enumeration_failure() {
        let cache = failing_cache();
        assert_eq!(cache.garbage_collection().await, 0);
        assert_eq!(cache.cached_elements(), 0);
    }

    #[tokio::test]
    async fn test_expire_backend_failure_still_decrements() {
        let cache = failing_cache();
        assert!(!cache.expire("/page").await);
        assert_eq!(cache.cached_elements(), -1);
    }
}
