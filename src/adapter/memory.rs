//! In-Memory Adapter
//!
//! Process-local map with lazy expiration. This is the reference expiry
//! algorithm the other backends follow.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AdapterOptions, CacheAdapter, ValueMap};
use crate::cache::{check_key, check_keys, CacheEntry, Snapshot, Ttl};
use crate::error::Result;

// == Entry Map ==
/// Prefixed key to entry map; expiry is checked against a caller-supplied `now`.
#[derive(Debug, Default)]
pub(crate) struct EntryMap {
    entries: HashMap<String, CacheEntry>,
}

impl EntryMap {
    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            entries: snapshot.into_iter().collect(),
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Live value for the key; an expired entry is removed.
    pub(crate) fn get(&mut self, key: &str, now: i64) -> Option<Value> {
        if self.evict_if_expired(key, now) {
            return None;
        }
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    pub(crate) fn contains(&mut self, key: &str, now: i64) -> bool {
        !self.evict_if_expired(key, now) && self.entries.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops every expired entry; returns how many were removed.
    pub(crate) fn purge_expired(&mut self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    fn evict_if_expired(&mut self, key: &str, now: i64) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now));
        if expired {
            self.entries.remove(key);
            debug!(key, "evicted expired entry");
        }
        expired
    }
}

// == Memory Adapter ==
/// Cache held entirely in this process.
#[derive(Debug)]
pub struct MemoryAdapter {
    options: AdapterOptions,
    entries: RwLock<EntryMap>,
}

impl MemoryAdapter {
    pub fn new(options: AdapterOptions) -> Self {
        options.warn_if_encrypt("memory");
        Self {
            options,
            entries: RwLock::new(EntryMap::default()),
        }
    }

    /// Number of stored entries, expired-but-unread ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new(AdapterOptions::default())
    }
}

#[async_trait]
impl CacheAdapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str, default: Value) -> Result<Value> {
        check_key(key)?;
        let cache_key = self.options.cache_key(key);
        let now = self.options.now();

        // Hits only need the read lock
        {
            let entries = self.entries.read().await;
            match entries.entries.get(&cache_key) {
                None => return Ok(default),
                Some(entry) if !entry.is_expired(now) => return Ok(entry.payload.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        Ok(entries.get(&cache_key, now).unwrap_or(default))
    }

    async fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<bool> {
        check_key(key)?;
        let expire_at = ttl.expire_at(self.options.now())?;

        let entry = CacheEntry::new(value, expire_at);
        self.entries
            .write()
            .await
            .insert(self.options.cache_key(key), entry);
        Ok(true)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let cache_key = self.options.cache_key(key);
        let now = self.options.now();
        Ok(self.entries.write().await.contains(&cache_key, now))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self
            .entries
            .write()
            .await
            .remove(&self.options.cache_key(key)))
    }

    async fn clear(&self) -> Result<bool> {
        self.entries.write().await.clear();
        Ok(true)
    }

    async fn get_multiple(&self, keys: &[&str], default: Value) -> Result<ValueMap> {
        check_keys(keys.iter().copied())?;

        let now = self.options.now();
        let mut entries = self.entries.write().await;
        let values = keys
            .iter()
            .map(|key| {
                let value = entries
                    .get(&self.options.cache_key(key), now)
                    .unwrap_or_else(|| default.clone());
                ((*key).to_string(), value)
            })
            .collect();
        Ok(values)
    }

    async fn set_multiple(&self, values: ValueMap, ttl: Ttl) -> Result<bool> {
        check_keys(values.keys().map(String::as_str))?;
        let expire_at = ttl.expire_at(self.options.now())?;

        let mut entries = self.entries.write().await;
        for (key, value) in values {
            entries.insert(self.options.cache_key(&key), CacheEntry::new(value, expire_at));
        }
        Ok(true)
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        check_keys(keys.iter().copied())?;

        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(&self.options.cache_key(key));
        }
        Ok(true)
    }

    /// Sweeps expired entries; `max_lifetime` is not used.
    async fn gc(&self, _max_lifetime: u64) -> Result<bool> {
        let removed = self.entries.write().await.purge_expired(self.options.now());
        debug!(removed, "memory gc finished");
        Ok(true)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::CacheError;
    use serde_json::json;
    use std::sync::Arc;

    fn adapter_with_clock() -> (MemoryAdapter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let adapter = MemoryAdapter::new(AdapterOptions::new().with_clock(clock.clone()));
        (adapter, clock)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let adapter = MemoryAdapter::default();

        assert!(adapter.set("key1", json!("value1"), Ttl::Never).await.unwrap());
        assert_eq!(adapter.get("key1", json!(null)).await.unwrap(), json!("value1"));
        assert_eq!(adapter.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_default() {
        let adapter = MemoryAdapter::default();
        assert_eq!(adapter.get("nope", json!("D")).await.unwrap(), json!("D"));
    }

    #[tokio::test]
    async fn test_keys_are_prefixed() {
        let adapter = MemoryAdapter::new(AdapterOptions::new().with_prefix("ns:"));
        adapter.set("k", json!(1), Ttl::Never).await.unwrap();

        let entries = adapter.entries.read().await;
        assert!(entries.entries.contains_key("ns:k"));
        assert!(!entries.entries.contains_key("k"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        let (adapter, clock) = adapter_with_clock();

        adapter.set("k", json!("v"), Ttl::from(1)).await.unwrap();
        clock.advance(2);

        assert_eq!(adapter.get("k", json!("D")).await.unwrap(), json!("D"));
        assert!(adapter.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_for_has() {
        let (adapter, clock) = adapter_with_clock();

        adapter.set("k", json!("v"), Ttl::from(1)).await.unwrap();
        assert!(adapter.has("k").await.unwrap());

        clock.advance(2);
        assert!(!adapter.has("k").await.unwrap());
        assert!(adapter.is_empty().await);
    }

    #[tokio::test]
    async fn test_unread_expired_entries_stay_in_memory() {
        let (adapter, clock) = adapter_with_clock();

        adapter.set("k", json!("v"), Ttl::from(1)).await.unwrap();
        clock.advance(10);

        // No background sweep
        assert_eq!(adapter.len().await, 1);
    }

    #[tokio::test]
    async fn test_gc_sweeps_expired_entries() {
        let (adapter, clock) = adapter_with_clock();

        adapter.set("short", json!(1), Ttl::from(1)).await.unwrap();
        adapter.set("long", json!(2), Ttl::Never).await.unwrap();
        clock.advance(5);

        assert!(adapter.gc(3_600).await.unwrap());
        assert_eq!(adapter.len().await, 1);
        assert!(adapter.has("long").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_positive_ttl_never_expires() {
        let (adapter, clock) = adapter_with_clock();

        adapter.set("zero", json!(0), Ttl::from(0)).await.unwrap();
        adapter.set("negative", json!(-1), Ttl::from(-30)).await.unwrap();
        clock.advance(10 * 365 * 86_400);

        assert_eq!(adapter.get("zero", json!(null)).await.unwrap(), json!(0));
        assert_eq!(adapter.get("negative", json!(null)).await.unwrap(), json!(-1));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let adapter = MemoryAdapter::default();

        assert!(!adapter.delete("k").await.unwrap());
        adapter.set("k", json!("v"), Ttl::Never).await.unwrap();
        assert!(adapter.delete("k").await.unwrap());
        assert!(!adapter.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let adapter = MemoryAdapter::default();

        assert!(matches!(
            adapter.set("", json!("v"), Ttl::Never).await,
            Err(CacheError::InvalidKey)
        ));
        assert!(matches!(adapter.get("", json!(null)).await, Err(CacheError::InvalidKey)));
        assert!(matches!(adapter.has("").await, Err(CacheError::InvalidKey)));
        assert!(matches!(adapter.delete("").await, Err(CacheError::InvalidKey)));
    }

    #[tokio::test]
    async fn test_batch_with_empty_key_applies_nothing() {
        let adapter = MemoryAdapter::default();

        let mut values = ValueMap::new();
        values.insert("a".into(), json!(1));
        values.insert(String::new(), json!(2));

        assert!(matches!(
            adapter.set_multiple(values, Ttl::Never).await,
            Err(CacheError::InvalidKeys)
        ));
        assert!(adapter.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_multiple_preserves_order() {
        let adapter = MemoryAdapter::default();
        adapter.set("b", json!("B"), Ttl::Never).await.unwrap();

        let values = adapter.get_multiple(&["c", "b", "a"], json!("D")).await.unwrap();
        let pairs: Vec<_> = values.into_iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("c".to_string(), json!("D")),
                ("b".to_string(), json!("B")),
                ("a".to_string(), json!("D")),
            ]
        );
    }

    #[test]
    fn test_entry_map_snapshot_roundtrip() {
        let mut map = EntryMap::default();
        map.insert("cache_a".into(), CacheEntry::new(json!(1), 0));

        let restored = EntryMap::from_snapshot(map.snapshot());
        assert_eq!(restored.len(), 1);
    }
}
