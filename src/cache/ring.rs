//! Ring Router Module
//!
//! Consistent-hash ring mapping keys to shards, growing with configured
//! capacity.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheKey, Shard};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_reaper;

// == Ring ==
/// Sorted shard ids and the shards they name.
///
/// Always holds at least one shard; shards are never removed.
#[derive(Debug)]
pub struct Ring<K, V> {
    /// Ascending, unique shard ids
    ids: Vec<u32>,
    shards: HashMap<u32, Arc<Shard<K, V>>>,
    reapers: Vec<JoinHandle<()>>,
}

impl<K, V> Ring<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    fn with_first_shard(runtime: &Handle) -> Self {
        let mut ring = Self {
            ids: Vec::new(),
            shards: HashMap::new(),
            reapers: Vec::new(),
        };
        ring.spawn_shard(runtime);
        ring
    }

    // == Locate ==
    /// Returns the id of the first shard at or after `hash`, wrapping around
    /// to the first id.
    pub fn locate(&self, hash: u32) -> u32 {
        let index = self.ids.partition_point(|&id| id < hash);
        self.ids[index % self.ids.len()]
    }

    // == Route ==
    /// Returns the shard responsible for `key`.
    pub fn route(&self, key: &K) -> &Arc<Shard<K, V>> {
        &self.shards[&self.locate(key.checksum())]
    }

    /// Shard ids in ring order.
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Shards in ring order.
    pub fn shards(&self) -> impl Iterator<Item = &Arc<Shard<K, V>>> + '_ {
        self.ids.iter().map(|id| &self.shards[id])
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Id of the shard following position `index`, wrapping to the first.
    fn successor(&self, index: usize) -> u32 {
        self.ids[(index + 1) % self.ids.len()]
    }

    /// Creates a shard with a fresh id, starts its reaper and places it on
    /// the ring. Returns the shard's position.
    fn spawn_shard(&mut self, runtime: &Handle) -> usize {
        let id = self.next_shard_id();
        let (shard, expired) = Shard::new(id);
        let shard = Arc::new(shard);

        self.reapers
            .push(spawn_reaper(runtime, Arc::downgrade(&shard), expired));
        self.shards.insert(id, shard);

        let index = self.ids.partition_point(|&existing| existing < id);
        self.ids.insert(index, id);
        index
    }

    /// Derives a shard id from the current timestamp.
    ///
    /// Ids must be unique, so a collision is retried with an attempt counter
    /// mixed into the checksum.
    fn next_shard_id(&self) -> u32 {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut attempt: u32 = 0;
        loop {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&nanos.to_le_bytes());
            if attempt > 0 {
                hasher.update(&attempt.to_le_bytes());
            }
            let id = hasher.finalize();
            if !self.shards.contains_key(&id) {
                return id;
            }
            attempt += 1;
        }
    }

    /// Moves the entries the shard at `index` now owns out of the shard
    /// that owned them before it joined.
    ///
    /// Keys route to the first id at or after their hash, so the arc claimed
    /// by a new shard was previously served by its ring successor.
    async fn rebalance(&self, index: usize) -> usize {
        if self.len() < 2 {
            return 0;
        }
        let id = self.ids[index];
        let newcomer = &self.shards[&id];
        let neighbor = &self.shards[&self.successor(index)];

        let moved = neighbor
            .drain_where(|key| self.locate(key.checksum()) == id)
            .await;
        let count = moved.len();
        newcomer.adopt(moved).await;

        debug!(shard = id, neighbor = neighbor.id(), moved = count, "Rebalanced ring");
        count
    }

    fn abort_reapers(&mut self) {
        for reaper in self.reapers.drain(..) {
            reaper.abort();
        }
    }
}

// == Ring Router ==
/// Routes keys to shards through a consistent-hash ring.
///
/// The ring structure has its own lock, separate from every shard lock.
/// Routing takes it shared; adding shards takes it exclusively.
#[derive(Debug)]
pub struct RingRouter<K, V> {
    ring: RwLock<Ring<K, V>>,
    /// Per-shard soft capacity, 0 disables growth
    threshold: usize,
    runtime: Handle,
}

impl<K, V> RingRouter<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a ring with `shards` shards (at least one), plus as many as
    /// needed to keep `max / threshold` entries per shard.
    ///
    /// Fails when called outside of a tokio runtime.
    pub fn new(shards: usize, threshold: usize, max: usize) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|err| CacheError::NoRuntime(err.to_string()))?;

        let mut ring = Ring::with_first_shard(&runtime);
        let wanted = shards.max(1).max(shards_for_capacity(max, threshold));
        while ring.len() < wanted {
            ring.spawn_shard(&runtime);
        }
        info!(shards = ring.len(), threshold, "Ring initialized");

        Ok(Self {
            ring: RwLock::new(ring),
            threshold,
            runtime,
        })
    }

    // == Read ==
    /// Locks the ring for routing.
    ///
    /// Holding the guard across a shard operation keeps the ring from
    /// moving keys underneath it.
    pub async fn read(&self) -> RwLockReadGuard<'_, Ring<K, V>> {
        self.ring.read().await
    }

    // == Route ==
    /// Returns the shard responsible for `key`.
    pub async fn route(&self, key: &K) -> Arc<Shard<K, V>> {
        self.ring.read().await.route(key).clone()
    }

    // == Add Shard ==
    /// Adds a shard to the ring and migrates the keys it now owns.
    ///
    /// Returns the new shard's id.
    pub async fn add_shard(&self) -> u32 {
        let mut ring = self.ring.write().await;
        let index = ring.spawn_shard(&self.runtime);
        ring.rebalance(index).await;

        let id = ring.ids[index];
        info!(shard = id, shards = ring.len(), "Added shard");
        id
    }

    // == Grow For Capacity ==
    /// Adds shards until `threshold * shard_count >= max`.
    ///
    /// Returns the number of shards added.
    pub async fn grow_for_capacity(&self, max: usize) -> usize {
        let wanted = shards_for_capacity(max, self.threshold);
        if self.ring.read().await.len() >= wanted {
            return 0;
        }

        let mut ring = self.ring.write().await;
        let mut added = 0;
        while ring.len() < wanted {
            let index = ring.spawn_shard(&self.runtime);
            ring.rebalance(index).await;
            added += 1;
        }
        if added > 0 {
            info!(added, shards = ring.len(), max, "Grew ring for capacity");
        }
        added
    }

    // == Shards ==
    /// Snapshot of the current shards in ring order.
    pub async fn shards(&self) -> Vec<Arc<Shard<K, V>>> {
        self.ring.read().await.shards().cloned().collect()
    }

    pub async fn shard_count(&self) -> usize {
        self.ring.read().await.len()
    }

    // == Shutdown ==
    /// Aborts every reaper task. Expired keys found afterwards stay in place
    /// until deleted or evicted.
    pub async fn shutdown(&self) {
        self.ring.write().await.abort_reapers();
    }
}

impl<K, V> Drop for RingRouter<K, V> {
    fn drop(&mut self) {
        for reaper in self.ring.get_mut().reapers.drain(..) {
            reaper.abort();
        }
    }
}

/// Shard count needed to hold `max` entries at `threshold` per shard.
fn shards_for_capacity(max: usize, threshold: usize) -> usize {
    if threshold == 0 || max <= threshold {
        return 1;
    }
    max.div_ceil(threshold)
}
