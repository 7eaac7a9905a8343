//! Cache Entry Module
//!
//! Defines the unit of storage shared by every adapter: a payload plus its
//! absolute expiration time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// A single cache entry with value and expiration metadata.
///
/// This is also the on-disk shape of an entry: `{ "expire_at": i64, "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Expiration timestamp (unix seconds), 0 = no expiration
    pub expire_at: i64,
    /// The stored value
    pub payload: Value,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring at the absolute second `expire_at`,
    /// usually obtained from [`Ttl::expire_at`](crate::cache::Ttl::expire_at).
    ///
    /// An `expire_at` of 0 means the entry never expires.
    pub fn new(payload: Value, expire_at: i64) -> Self {
        Self { expire_at, payload }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is stale once `now` is strictly past its expiration second, so
    /// an entry is still served during the second it expires in.
    pub fn is_expired(&self, now: i64) -> bool {
        is_expired(self.expire_at, now)
    }

    // == Time To Live ==
    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self, now: i64) -> Option<u64> {
        if self.expire_at == 0 {
            return None;
        }
        Some((self.expire_at - now).max(0) as u64)
    }
}

// == Utility Functions ==
/// Lazy-expiration predicate shared by every backend.
pub fn is_expired(expire_at: i64, now: i64) -> bool {
    expire_at != 0 && expire_at < now
}
