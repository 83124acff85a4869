//! Background Tasks Module
//!
//! Contains background tasks that run alongside the cache.
//!
//! # Tasks
//! - Expiration Reaper: Removes keys found expired on read, one task per shard

mod reaper;

pub use reaper::spawn_reaper;
