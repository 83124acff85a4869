//! Cache Module
//!
//! Sharded in-memory caching with consistent-hash routing, TTL expiration
//! and LRU eviction.

mod entry;
mod evict;
mod key;
mod lru;
mod ring;
mod shard;
mod stats;
mod store;


// Re-export public types
pub use entry::{Item, NOT_EXPIRE, NO_EXPIRE};
pub use evict::{batch_size, enforce_capacity};
pub use key::{CacheKey, F64Key};
pub use lru::RecencyList;
pub use ring::{Ring, RingRouter};
pub use shard::Shard;
pub use stats::CacheStats;
pub use store::Cache;

// == Public Constants ==
/// Default per-shard soft capacity; the ring adds a shard for every
/// additional multiple of this in the configured maximum.
pub const DEFAULT_SHARD_THRESHOLD: usize = 10_000;
