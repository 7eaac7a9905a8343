//! Cache Module
//!
//! Building blocks shared by every adapter: entries, TTLs, validation,
//! serialization, hashing and time.

mod clock;
mod entry;
mod hashing;
mod serializer;
pub mod snapshot;
mod ttl;
mod validate;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{is_expired, CacheEntry};
pub use hashing::{key_digest, slot_hash};
pub use serializer::{JsonSerializer, Serializer};
pub use snapshot::Snapshot;
pub use ttl::Ttl;
pub use validate::{check_key, check_keys, key_from_json, keys_from_json};

// == Public Constants ==
/// Key prefix used by local adapters when none is configured
pub const DEFAULT_PREFIX: &str = "cache_";

/// Key prefix used by the remote adapter when none is configured
pub const DEFAULT_REMOTE_PREFIX: &str = "cache:";
