//! Configuration Module
//!
//! Handles capacity and sharding parameters, loadable from environment variables.

use std::env;

use crate::cache::DEFAULT_SHARD_THRESHOLD;

/// Fraction used when the free-up percent is configured at or above 100.
const CLAMPED_FREE_UP_FRACTION: f64 = 0.5;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries, 0 = unbounded
    pub max_entries: usize,
    /// Share of `max_entries` freed per eviction pass, in percent
    pub free_up_percent: u32,
    /// Number of shards the ring starts with (at least one is always created)
    pub initial_shards: usize,
    /// Per-shard soft capacity; the ring grows once `max_entries` exceeds
    /// `shard_threshold * shard_count`
    pub shard_threshold: usize,
}

impl CacheConfig {
    /// Creates a configuration with the given capacity and free-up percent.
    pub fn new(max_entries: usize, free_up_percent: u32) -> Self {
        Self {
            max_entries,
            free_up_percent,
            ..Self::default()
        }
    }

    /// Sets the initial shard count.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.initial_shards = shards;
        self
    }

    /// Sets the per-shard soft threshold used for ring growth.
    pub fn with_shard_threshold(mut self, threshold: usize) -> Self {
        self.shard_threshold = threshold;
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries, 0 = unbounded (default: 0)
    /// - `CACHE_FREE_UP_PERCENT` - Percent of max freed per eviction pass (default: 0)
    /// - `CACHE_SHARDS` - Initial shard count (default: 1)
    /// - `CACHE_SHARD_THRESHOLD` - Per-shard soft capacity (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_entries),
            free_up_percent: env::var("CACHE_FREE_UP_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.free_up_percent),
            initial_shards: env::var("CACHE_SHARDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.initial_shards),
            shard_threshold: env::var("CACHE_SHARD_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.shard_threshold),
        }
    }

    /// Returns the free-up share as a fraction in `[0, 1]`.
    ///
    /// Percent values of 100 and above are clamped to 50%.
    pub fn free_up_fraction(&self) -> f64 {
        if self.free_up_percent >= 100 {
            CLAMPED_FREE_UP_FRACTION
        } else {
            f64::from(self.free_up_percent) / 100.0
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 0,
            free_up_percent: 0,
            initial_shards: 1,
            shard_threshold: DEFAULT_SHARD_THRESHOLD,
        }
    }
}
