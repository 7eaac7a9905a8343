//! Single-File Adapter
//!
//! Keeps the in-memory model and mirrors the whole map into one snapshot file.
//! Every mutation rewrites the complete file, so cost grows with cache size;
//! suited to small caches with infrequent writes. Only one instance may write
//! a given file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::memory::EntryMap;
use super::{AdapterOptions, CacheAdapter, ValueMap};
use crate::cache::{check_key, check_keys, snapshot, CacheEntry, Ttl};
use crate::error::Result;
use crate::store::ByteStore;

// == File Adapter ==
#[derive(Debug)]
pub struct FileAdapter {
    options: AdapterOptions,
    data_file: PathBuf,
    store: Arc<dyn ByteStore>,
    /// Held across the file rewrite so saves land in call order
    entries: Mutex<EntryMap>,
}

impl FileAdapter {
    pub fn new(
        options: AdapterOptions,
        data_file: impl Into<PathBuf>,
        store: Arc<dyn ByteStore>,
    ) -> Self {
        options.warn_if_encrypt("file");
        Self {
            options,
            data_file: data_file.into(),
            store,
            entries: Mutex::new(EntryMap::default()),
        }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Rewrites the snapshot file from `entries`. Failures are logged and
    /// reported as `false`.
    async fn save(&self, entries: &EntryMap) -> bool {
        let bytes = match snapshot::encode(self.options.serializer.as_ref(), &entries.snapshot())
        {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    file = %self.data_file.display(),
                    error = %err,
                    "failed to encode cache snapshot"
                );
                return false;
            }
        };

        match self.store.write(&self.data_file, &bytes).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    file = %self.data_file.display(),
                    error = %err,
                    "failed to write cache snapshot"
                );
                false
            }
        }
    }
}

#[async_trait]
impl CacheAdapter for FileAdapter {
    fn name(&self) -> &'static str {
        "file"
    }

    /// Loads the snapshot; a missing or empty file is an empty cache.
    async fn init(&self) -> Result<()> {
        let Some(bytes) = self.store.read(&self.data_file).await? else {
            info!(file = %self.data_file.display(), "no cache snapshot, starting empty");
            return Ok(());
        };

        let loaded = snapshot::decode(self.options.serializer.as_ref(), &bytes)?;
        info!(file = %self.data_file.display(), entries = loaded.len(), "cache snapshot loaded");
        *self.entries.lock().await = EntryMap::from_snapshot(loaded);
        Ok(())
    }

    async fn close(&self) -> Result<bool> {
        let entries = self.entries.lock().await;
        Ok(self.save(&entries).await)
    }

    async fn get(&self, key: &str, default: Value) -> Result<Value> {
        check_key(key)?;
        let now = self.options.now();
        let mut entries = self.entries.lock().await;
        Ok(entries
            .get(&self.options.cache_key(key), now)
            .unwrap_or(default))
    }

    async fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<bool> {
        check_key(key)?;
        let expire_at = ttl.expire_at(self.options.now())?;

        let mut entries = self.entries.lock().await;
        entries.insert(self.options.cache_key(key), CacheEntry::new(value, expire_at));
        Ok(self.save(&entries).await)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let now = self.options.now();
        Ok(self
            .entries
            .lock()
            .await
            .contains(&self.options.cache_key(key), now))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;

        let mut entries = self.entries.lock().await;
        if !entries.remove(&self.options.cache_key(key)) {
            return Ok(false);
        }
        Ok(self.save(&entries).await)
    }

    async fn clear(&self) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        Ok(self.save(&entries).await)
    }

    async fn get_multiple(&self, keys: &[&str], default: Value) -> Result<ValueMap> {
        check_keys(keys.iter().copied())?;

        let now = self.options.now();
        let mut entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .map(|key| {
                let value = entries
                    .get(&self.options.cache_key(key), now)
                    .unwrap_or_else(|| default.clone());
                ((*key).to_string(), value)
            })
            .collect())
    }

    async fn set_multiple(&self, values: ValueMap, ttl: Ttl) -> Result<bool> {
        check_keys(values.keys().map(String::as_str))?;
        let expire_at = ttl.expire_at(self.options.now())?;

        let mut entries = self.entries.lock().await;
        for (key, value) in values {
            entries.insert(self.options.cache_key(&key), CacheEntry::new(value, expire_at));
        }
        Ok(self.save(&entries).await)
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        check_keys(keys.iter().copied())?;

        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(&self.options.cache_key(key));
        }
        Ok(self.save(&entries).await)
    }

    /// Sweeps expired entries and rewrites the file if any were dropped.
    async fn gc(&self, _max_lifetime: u64) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let removed = entries.purge_expired(self.options.now());
        debug!(removed, "file gc finished");
        if removed == 0 {
            return Ok(true);
        }
        Ok(self.save(&entries).await)
    }
}
