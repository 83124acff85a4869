//! Cache Store Module
//!
//! Public cache surface composing the ring router, shard stores, expiration
//! reapers and eviction controller.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::evict::enforce_capacity;
use crate::cache::ring::RingRouter;
use crate::cache::{CacheKey, CacheStats, NOT_EXPIRE};
use crate::config::CacheConfig;
use crate::error::Result;

// == Cache ==
/// Sharded in-memory cache with LRU eviction and TTL support.
///
/// Keys are routed to shards through a consistent-hash ring. Every shard has
/// its own lock, so operations on different shards do not contend. Share the
/// cache between tasks by wrapping it in an `Arc`.
///
/// # Example
/// ```no_run
/// # async fn demo() -> ringcache::error::Result<()> {
/// use std::time::Duration;
/// use ringcache::{Cache, CacheConfig};
///
/// let cache: Cache<String, String> = Cache::new(CacheConfig::new(1000, 10))?;
/// cache.put_with_ttl("session".to_string(), "token".to_string(), Duration::from_secs(30)).await;
/// assert_eq!(cache.get(&"session".to_string()).await, Some("token".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Cache<K, V> {
    router: RingRouter<K, V>,
    /// Maximum number of entries, 0 = unbounded
    max: AtomicUsize,
    /// Free-up fraction stored as `f64` bits
    free_up: AtomicU64,
}

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache from a configuration.
    ///
    /// Must be called within a tokio runtime, which hosts the per-shard
    /// expiration reapers.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let router = RingRouter::new(
            config.initial_shards,
            config.shard_threshold,
            config.max_entries,
        )?;

        Ok(Self {
            router,
            max: AtomicUsize::new(config.max_entries),
            free_up: AtomicU64::new(config.free_up_fraction().to_bits()),
        })
    }

    /// Creates a cache holding up to `max_entries` (0 = unbounded), freeing
    /// `free_up_percent` percent of that per eviction pass.
    pub fn with_capacity(max_entries: usize, free_up_percent: u32) -> Result<Self> {
        Self::new(CacheConfig::new(max_entries, free_up_percent))
    }

    // == Put ==
    /// Stores a key-value pair that never expires.
    pub async fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, NOT_EXPIRE).await;
    }

    /// Stores a key-value pair expiring after `ttl`.
    ///
    /// Overwrites any existing value and TTL, marks the key as most recently
    /// used, then runs the eviction check. Pass [`NOT_EXPIRE`] to store
    /// forever.
    pub async fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        {
            let ring = self.router.read().await;
            ring.route(&key).put(key, value, ttl).await;
        }
        self.evict().await;
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` for absent or expired keys; expired keys are removed
    /// in the background.
    pub async fn get(&self, key: &K) -> Option<V> {
        let ring = self.router.read().await;
        ring.route(key).get(key).await
    }

    // == Del ==
    /// Removes keys. Absent keys are ignored.
    pub async fn del(&self, keys: &[K]) {
        let ring = self.router.read().await;
        for key in keys {
            ring.route(key).delete(key).await;
        }
    }

    // == Keys ==
    /// Returns a best-effort snapshot of the live keys.
    ///
    /// Shards are scanned one at a time, each under its own lock only.
    pub async fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.size().await);
        for shard in self.router.shards().await {
            keys.extend(shard.keys().await);
        }
        keys
    }

    // == Expire At ==
    /// Returns the stored expiration timestamp of `key`, or
    /// [`NO_EXPIRE`](crate::cache::NO_EXPIRE) if it never expires.
    ///
    /// Does not check whether the key is still live.
    pub async fn expire_at(&self, key: &K) -> Option<DateTime<Utc>> {
        let ring = self.router.read().await;
        ring.route(key).expire_at(key).await
    }

    // == Max ==
    /// Sets the maximum number of entries (0 = unbounded), growing the ring
    /// when the new capacity needs more shards.
    pub async fn set_max(&self, max: usize) {
        self.max.store(max, Ordering::Relaxed);
        let added = self.router.grow_for_capacity(max).await;
        debug!(max, added, "Updated capacity");
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::Relaxed)
    }

    /// Share of `max` freed per eviction pass.
    pub fn free_up_fraction(&self) -> f64 {
        f64::from_bits(self.free_up.load(Ordering::Relaxed))
    }

    // == Size ==
    /// Returns the number of stored entries across all shards, including
    /// expired entries not yet reaped.
    pub async fn size(&self) -> usize {
        self.router.shards().await.iter().map(|shard| shard.len()).sum()
    }

    pub async fn shard_count(&self) -> usize {
        self.router.shard_count().await
    }

    /// Returns the id of the shard `key` routes to.
    pub async fn shard_for(&self, key: &K) -> u32 {
        self.router.route(key).await.id()
    }

    // == Stats ==
    /// Returns counters aggregated over all shards.
    pub async fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for shard in self.router.shards().await {
            total += &shard.stats().await;
        }
        total
    }

    // == Shutdown ==
    /// Stops the background reapers. The cache stays usable; expired keys
    /// are still hidden from reads but no longer removed in the background.
    pub async fn shutdown(&self) {
        self.router.shutdown().await;
    }

    async fn evict(&self) {
        let max = self.max();
        if max == 0 {
            return;
        }
        let shards = self.router.shards().await;
        enforce_capacity(shards, max, self.free_up_fraction()).await;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{F64Key, NO_EXPIRE};
    use crate::error::CacheError;

    fn cache(max: usize, percent: u32) -> Cache<String, String> {
        Cache::with_capacity(max, percent).unwrap()
    }

    #[test]
    fn test_new_requires_runtime() {
        let result: Result<Cache<i32, i32>> = Cache::with_capacity(10, 0);
        assert!(matches!(result, Err(CacheError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_cache_new() {
        let cache = cache(0, 0);
        assert_eq!(cache.size().await, 0);
        assert_eq!(cache.max(), 0);
        assert_eq!(cache.shard_count().await, 1);
        assert!(cache.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = cache(100, 0);

        cache.put("key1".to_string(), "value1".to_string()).await;

        assert_eq!(cache.get(&"key1".to_string()).await, Some("value1".to_string()));
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = cache(100, 0);
        assert_eq!(cache.get(&"nonexistent".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_del_variadic_and_idempotent() {
        let cache = cache(100, 0);
        for key in ["a", "b", "c"] {
            cache.put(key.to_string(), "v".to_string()).await;
        }

        cache.del(&["a".to_string(), "b".to_string(), "missing".to_string()]).await;
        cache.del(&["a".to_string()]).await;

        assert_eq!(cache.size().await, 1);
        assert_eq!(cache.keys().await, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let cache = cache(100, 0);

        cache.put("key1".to_string(), "value1".to_string()).await;
        cache.put("key1".to_string(), "value2".to_string()).await;

        assert_eq!(cache.get(&"key1".to_string()).await, Some("value2".to_string()));
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = cache(100, 0);
        let key = "key1".to_string();

        cache.put_with_ttl(key.clone(), "value1".to_string(), Duration::from_millis(10)).await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get(&key).await, None);
        assert!(!cache.keys().await.contains(&key));
    }

    #[tokio::test]
    async fn test_expire_at() {
        let cache = cache(100, 0);
        let before = Utc::now();

        cache.put("forever".to_string(), "v".to_string()).await;
        cache.put_with_ttl("minute".to_string(), "v".to_string(), Duration::from_secs(60)).await;

        assert_eq!(cache.expire_at(&"forever".to_string()).await, Some(NO_EXPIRE));
        let minute = cache.expire_at(&"minute".to_string()).await.unwrap();
        assert!(minute >= before + chrono::Duration::seconds(60));
        assert_eq!(cache.expire_at(&"missing".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = cache(3, 0);

        cache.put("key1".to_string(), "value1".to_string()).await;
        cache.put("key2".to_string(), "value2".to_string()).await;
        cache.put("key3".to_string(), "value3".to_string()).await;
        cache.put("key4".to_string(), "value4".to_string()).await;

        assert_eq!(cache.size().await, 3);
        assert_eq!(cache.get(&"key1".to_string()).await, None);
        assert!(cache.get(&"key4".to_string()).await.is_some());
    }

    #[tokio::test]
    async fn test_lru_touch_on_get() {
        let cache = cache(3, 0);

        cache.put("key1".to_string(), "value1".to_string()).await;
        cache.put("key2".to_string(), "value2".to_string()).await;
        cache.put("key3".to_string(), "value3".to_string()).await;

        cache.get(&"key1".to_string()).await;
        cache.put("key4".to_string(), "value4".to_string()).await;

        assert!(cache.get(&"key1".to_string()).await.is_some());
        assert_eq!(cache.get(&"key2".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_set_max_grows_ring() {
        let cache: Cache<i32, i32> =
            Cache::new(CacheConfig::new(10, 0).with_shard_threshold(10)).unwrap();
        for key in 0..10 {
            cache.put(key, key).await;
        }

        cache.set_max(45).await;

        assert_eq!(cache.max(), 45);
        assert_eq!(cache.shard_count().await, 5);
        for key in 0..10 {
            assert_eq!(cache.get(&key).await, Some(key), "key {key} lost during growth");
        }
    }

    #[tokio::test]
    async fn test_set_max_to_unbounded() {
        let cache: Cache<i32, i32> = Cache::with_capacity(2, 0).unwrap();
        cache.set_max(0).await;

        for key in 0..50 {
            cache.put(key, key).await;
        }
        assert_eq!(cache.size().await, 50);
    }

    #[tokio::test]
    async fn test_free_up_percent_clamped() {
        let cache: Cache<i64, i64> = Cache::with_capacity(10, 150).unwrap();
        assert_eq!(cache.free_up_fraction(), 0.5);
    }

    #[tokio::test]
    async fn test_float_keys() {
        let cache: Cache<F64Key, &'static str> = Cache::with_capacity(0, 0).unwrap();

        cache.put(F64Key(1.5), "one and a half").await;
        cache.put(F64Key(-0.25), "negative quarter").await;

        assert_eq!(cache.get(&F64Key(1.5)).await, Some("one and a half"));
        assert_eq!(cache.get(&F64Key(-0.25)).await, Some("negative quarter"));
        assert_eq!(cache.get(&F64Key(2.0)).await, None);
    }

    #[tokio::test]
    async fn test_stats_aggregate() {
        let cache: Cache<i32, i32> =
            Cache::new(CacheConfig::new(0, 0).with_shards(4)).unwrap();
        for key in 0..20 {
            cache.put(key, key).await;
        }
        for key in 0..25 {
            cache.get(&key).await;
        }

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 20);
        assert_eq!(stats.misses, 5);
        assert_eq!(stats.total_entries, 20);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_cache_usable() {
        let cache = cache(0, 0);
        cache.shutdown().await;

        cache.put("k".to_string(), "v".to_string()).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some("v".to_string()));
    }
}
