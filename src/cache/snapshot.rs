//! Snapshot Module
//!
//! Whole-cache dump format shared by the single-file adapter and the table
//! dump/restore: a serializer-encoded map `stored_key -> { expire_at, payload }`.

use std::collections::BTreeMap;

use crate::cache::{CacheEntry, Serializer};
use crate::error::Result;

/// Entries keyed by their prefixed (stored) key.
pub type Snapshot = BTreeMap<String, CacheEntry>;

/// Encodes a snapshot with the adapter's serializer.
pub fn encode(serializer: &dyn Serializer, snapshot: &Snapshot) -> Result<Vec<u8>> {
    let value = serde_json::to_value(snapshot)?;
    serializer.serialize(&value)
}

/// Decodes a snapshot; empty input is an empty snapshot.
pub fn decode(serializer: &dyn Serializer, bytes: &[u8]) -> Result<Snapshot> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Snapshot::new());
    }
    let value = serializer.deserialize(bytes)?;
    Ok(serde_json::from_value(value)?)
}
