//! Expiration Reaper Task
//!
//! Background task that deletes keys a shard found expired during a read.

use std::sync::Weak;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheKey, Shard};

/// Spawns the expiration reaper of one shard.
///
/// The task waits on the shard's expiration queue and removes each received
/// key if it is still expired. It holds only a weak reference to the shard,
/// so it ends on its own once the shard is dropped and the queue closes.
///
/// # Arguments
/// * `runtime` - Runtime the task is spawned on
/// * `shard` - Weak reference to the shard being reaped
/// * `expired` - Receiving end of the shard's expiration queue
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
pub fn spawn_reaper<K, V>(
    runtime: &Handle,
    shard: Weak<Shard<K, V>>,
    mut expired: UnboundedReceiver<K>,
) -> JoinHandle<()>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    runtime.spawn(async move {
        while let Some(key) = expired.recv().await {
            let Some(shard) = shard.upgrade() else {
                break;
            };

            if shard.remove_expired(&key).await {
                debug!(shard = shard.id(), key = ?key, "Reaped expired key");
            }
        }

        debug!("Expiration reaper stopped");
    })
}
