//! Eviction Controller Module
//!
//! Keeps shards within the configured capacity after writes.
//!
//! Each shard is bounded by the *global* maximum rather than a share of it,
//! so aggregate occupancy may exceed `max` when keys are spread over several
//! shards. Eviction only starts once the aggregate size exceeds `max`.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{CacheKey, Shard};

// == Batch Size ==
/// Number of entries evicted per pass.
///
/// `floor(max * fraction)` when `fraction > 0`, never less than one so every
/// pass makes progress; one entry per pass when `fraction == 0`.
pub fn batch_size(max: usize, fraction: f64) -> usize {
    if fraction > 0.0 {
        ((max as f64 * fraction).floor() as usize).max(1)
    } else {
        1
    }
}

// == Enforce Capacity ==
/// Evicts least recently used entries from every shard above `max`.
///
/// Does nothing when `max` is 0 (unbounded) or the aggregate size is within
/// `max`. Otherwise shards are trimmed concurrently, each under its own lock,
/// and the call returns once all of them are done.
///
/// Returns the number of entries evicted.
pub async fn enforce_capacity<K, V>(shards: Vec<Arc<Shard<K, V>>>, max: usize, fraction: f64) -> usize
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    if max == 0 {
        return 0;
    }
    let total: usize = shards.iter().map(|shard| shard.len()).sum();
    if total <= max {
        return 0;
    }

    let batch = batch_size(max, fraction);
    let mut tasks = JoinSet::new();
    for shard in shards.into_iter().filter(|shard| shard.len() > max) {
        tasks.spawn(async move { shard.evict_down_to(max, batch).await });
    }

    let mut evicted = 0;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(count) => evicted += count,
            Err(err) => warn!(error = %err, "Eviction task failed"),
        }
    }

    if evicted > 0 {
        debug!(evicted, total, max, batch, "Evicted least recently used entries");
    }
    evicted
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NOT_EXPIRE;

    async fn filled_shard(id: u32, keys: std::ops::Range<i32>) -> Arc<Shard<i32, i32>> {
        let (shard, _rx) = Shard::new(id);
        for key in keys {
            shard.put(key, key, NOT_EXPIRE).await;
        }
        Arc::new(shard)
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(100, 0.1), 10);
        assert_eq!(batch_size(100, 0.0), 1);
        assert_eq!(batch_size(5, 0.1), 1);
        assert_eq!(batch_size(100, 0.5), 50);
        assert_eq!(batch_size(99, 0.25), 24);
    }

    #[tokio::test]
    async fn test_unbounded_never_evicts() {
        let shard = filled_shard(1, 0..50).await;

        assert_eq!(enforce_capacity(vec![shard.clone()], 0, 0.0).await, 0);
        assert_eq!(shard.len(), 50);
    }

    #[tokio::test]
    async fn test_within_capacity_is_noop() {
        let shard = filled_shard(1, 0..10).await;

        assert_eq!(enforce_capacity(vec![shard.clone()], 10, 0.0).await, 0);
        assert_eq!(shard.len(), 10);
    }

    #[tokio::test]
    async fn test_single_shard_evicts_oldest() {
        let shard = filled_shard(1, 0..15).await;

        let evicted = enforce_capacity(vec![shard.clone()], 10, 0.0).await;

        assert_eq!(evicted, 5);
        assert_eq!(shard.len(), 10);
        assert_eq!(shard.get(&4).await, None);
        assert_eq!(shard.get(&5).await, Some(5));
    }

    #[tokio::test]
    async fn test_each_shard_bounded_by_global_max() {
        // Aggregate 18 > max 10, but no single shard exceeds 10: nothing is
        // evicted because shards are compared against the global max.
        let a = filled_shard(1, 0..9).await;
        let b = filled_shard(2, 100..109).await;

        let evicted = enforce_capacity(vec![a.clone(), b.clone()], 10, 0.0).await;

        assert_eq!(evicted, 0);
        assert_eq!(a.len() + b.len(), 18);
    }

    #[tokio::test]
    async fn test_only_oversized_shards_are_trimmed() {
        let big = filled_shard(1, 0..25).await;
        let small = filled_shard(2, 100..105).await;

        let evicted = enforce_capacity(vec![big.clone(), small.clone()], 20, 0.1).await;

        // batch = 2: 25 -> 23 -> 21 -> 19
        assert_eq!(evicted, 6);
        assert_eq!(big.len(), 19);
        assert_eq!(small.len(), 5);
    }
}
