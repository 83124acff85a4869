//! ringcache - An embedded, sharded in-memory cache
//!
//! Provides LRU eviction under a global capacity, per-entry TTL expiration
//! and consistent-hash routing of keys across independently locked shards.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheKey, CacheStats, F64Key, NOT_EXPIRE, NO_EXPIRE};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
