//! Cache Entry Module
//!
//! Defines the item stored per key, with its expiration timestamp.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Sentinels ==
/// TTL meaning "store forever".
pub const NOT_EXPIRE: Duration = Duration::MAX;

/// Expiration timestamp of an item that never expires.
pub const NO_EXPIRE: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

// == Item ==
/// A stored value together with its expiration timestamp.
#[derive(Debug, Clone)]
pub struct Item<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp, [`NO_EXPIRE`] = never
    pub expires_at: DateTime<Utc>,
}

impl<V> Item<V> {
    // == Constructor ==
    /// Creates an item expiring `ttl` from now.
    ///
    /// A `ttl` of [`NOT_EXPIRE`], or one too large to represent as a
    /// timestamp, produces an item that never expires.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: expiration_after(ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the item has expired.
    ///
    /// An item is expired once the current time reaches its expiration
    /// timestamp. Items stamped with [`NO_EXPIRE`] never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Same as [`Item::is_expired`], against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at != NO_EXPIRE && self.expires_at <= now
    }
}

/// Computes the expiration timestamp for a TTL starting now.
fn expiration_after(ttl: Duration) -> DateTime<Utc> {
    if ttl == NOT_EXPIRE {
        return NO_EXPIRE;
    }
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(NO_EXPIRE)
}
