//! Shard Store Module
//!
//! One partition of the keyspace: a key-item map, its recency list and an
//! expiration queue, all behind the shard's own lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStats, Item, RecencyList};

/// State guarded by the shard lock.
#[derive(Debug)]
struct ShardState<K, V> {
    data: HashMap<K, Item<V>>,
    recency: RecencyList<K>,
    stats: CacheStats,
}

// == Shard ==
/// A partition of the cache owning its entries, recency order and lock.
#[derive(Debug)]
pub struct Shard<K, V> {
    /// Position of the shard on the ring
    id: u32,
    state: RwLock<ShardState<K, V>>,
    /// Entry count, recomputed from the map after each structural change
    size: AtomicUsize,
    /// Keys observed expired, waiting for the reaper
    expire_tx: mpsc::UnboundedSender<K>,
}

impl<K, V> Shard<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty shard and the receiving end of its expiration queue.
    ///
    /// The receiver is meant for the shard's reaper task.
    pub fn new(id: u32) -> (Self, mpsc::UnboundedReceiver<K>) {
        let (expire_tx, expire_rx) = mpsc::unbounded_channel();
        let shard = Self {
            id,
            state: RwLock::new(ShardState {
                data: HashMap::new(),
                recency: RecencyList::new(),
                stats: CacheStats::new(),
            }),
            size: AtomicUsize::new(0),
            expire_tx,
        };
        (shard, expire_rx)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    // == Put ==
    /// Inserts or overwrites `key`, resetting its value and TTL.
    ///
    /// A `ttl` of [`NOT_EXPIRE`](crate::cache::NOT_EXPIRE) stores the item forever.
    pub async fn put(&self, key: K, value: V, ttl: Duration) {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        state.recency.touch(&key);
        state.data.insert(key, Item::new(value, ttl));
        self.size.store(state.data.len(), Ordering::Relaxed);
    }

    // == Get ==
    /// Retrieves a live value and marks it as recently used.
    ///
    /// An expired item is reported as missing and handed to the reaper; it is
    /// not removed here.
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(item) = state.data.get(key) else {
            state.stats.record_miss();
            return None;
        };

        if item.is_expired() {
            state.stats.record_miss();
            state.stats.record_expiration();
            self.schedule_expiry(key.clone());
            return None;
        }

        let value = item.value.clone();
        state.recency.touch(key);
        state.stats.record_hit();
        Some(value)
    }

    // == Expire At ==
    /// Returns the stored expiration timestamp, without touching the key or
    /// checking whether it is still live.
    pub async fn expire_at(&self, key: &K) -> Option<DateTime<Utc>> {
        let state = self.state.read().await;
        state.data.get(key).map(|item| item.expires_at)
    }

    // == Delete ==
    /// Removes `key` from the map and the recency list.
    ///
    /// Returns whether anything was removed; deleting an absent key is a no-op.
    pub async fn delete(&self, key: &K) -> bool {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if state.data.remove(key).is_none() {
            return false;
        }
        state.recency.remove(key);
        self.size.store(state.data.len(), Ordering::Relaxed);
        true
    }

    // == Remove Expired ==
    /// Removes `key` only if its item is still expired.
    ///
    /// Used by the reaper: a key refreshed by a `put` after it was queued is
    /// left alone.
    pub async fn remove_expired(&self, key: &K) -> bool {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        match state.data.get(key) {
            Some(item) if item.is_expired() => {}
            _ => return false,
        }
        state.data.remove(key);
        state.recency.remove(key);
        self.size.store(state.data.len(), Ordering::Relaxed);
        true
    }

    // == Keys ==
    /// Returns the live keys of this shard.
    pub async fn keys(&self) -> Vec<K> {
        let state = self.state.read().await;
        let now = Utc::now();
        state
            .data
            .iter()
            .filter(|(_, item)| !item.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Evict Down To ==
    /// Evicts least recently used entries while the shard holds more than
    /// `max` entries, `batch` entries per pass.
    ///
    /// Returns the number of entries removed.
    pub async fn evict_down_to(&self, max: usize, batch: usize) -> usize {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let batch = batch.max(1);
        let mut evicted = 0;

        while state.data.len() > max {
            let mut popped = 0;
            while popped < batch {
                let Some(oldest) = state.recency.evict_oldest() else {
                    break;
                };
                popped += 1;
                if state.data.remove(&oldest).is_some() {
                    evicted += 1;
                }
            }
            if popped == 0 {
                warn!(shard = self.id, entries = state.data.len(), "Recency list drained before reaching capacity");
                break;
            }
        }

        state.stats.record_evictions(evicted);
        self.size.store(state.data.len(), Ordering::Relaxed);
        evicted
    }

    // == Drain Where ==
    /// Removes every entry whose key matches `pred`, oldest first.
    pub async fn drain_where<F>(&self, pred: F) -> Vec<(K, Item<V>)>
    where
        F: Fn(&K) -> bool,
    {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let matching: Vec<K> = state.recency.iter().filter(|key| pred(key)).cloned().collect();
        let mut drained = Vec::with_capacity(matching.len());
        for key in matching {
            state.recency.remove(&key);
            if let Some(item) = state.data.remove(&key) {
                drained.push((key, item));
            }
        }

        self.size.store(state.data.len(), Ordering::Relaxed);
        drained
    }

    // == Adopt ==
    /// Takes ownership of migrated entries, touching them in the given order.
    pub async fn adopt(&self, items: Vec<(K, Item<V>)>) {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        for (key, item) in items {
            state.recency.touch(&key);
            state.data.insert(key, item);
        }
        self.size.store(state.data.len(), Ordering::Relaxed);
    }

    // == Stats ==
    /// Returns this shard's counters.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.data.len());
        stats
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues `key` for the reaper without waiting on it.
    fn schedule_expiry(&self, key: K) {
        debug!(shard = self.id, key = ?key, "Queueing expired key");
        if let Err(err) = self.expire_tx.send(key) {
            warn!(shard = self.id, key = ?err.0, "Expiration reaper is gone, key left in place");
        }
    }
}
