//! Multi-File Adapter
//!
//! One file per key under `save_path`, named `prefix + sha256(key)`. Each file
//! holds one serialized entry and is read, written and removed independently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{AdapterOptions, CacheAdapter, ValueMap};
use crate::cache::{check_key, check_keys, key_digest, CacheEntry, Ttl};
use crate::error::Result;
use crate::store::ByteStore;

/// Directory name under the system temp dir used when no save path is set.
pub const DEFAULT_SAVE_DIR: &str = "cache-files";

// == Multi-File Adapter ==
#[derive(Debug)]
pub struct MultiFileAdapter {
    options: AdapterOptions,
    save_path: PathBuf,
    store: Arc<dyn ByteStore>,
}

impl MultiFileAdapter {
    /// `save_path` of `None` selects `<temp_dir>/cache-files`.
    pub fn new(
        options: AdapterOptions,
        save_path: Option<PathBuf>,
        store: Arc<dyn ByteStore>,
    ) -> Self {
        options.warn_if_encrypt("multi_file");
        Self {
            options,
            save_path: save_path.unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SAVE_DIR)),
            store,
        }
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// File holding the entry for `key`.
    pub fn cache_file(&self, key: &str) -> PathBuf {
        self.save_path
            .join(format!("{}{}", self.options.prefix, key_digest(key)))
    }

    /// Reads and decodes one entry, deleting it if expired. Any read or decode
    /// failure is a miss.
    async fn load(&self, key: &str) -> Option<CacheEntry> {
        let file = self.cache_file(key);

        let bytes = match self.store.read(&file).await {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => return None,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to read cache file");
                return None;
            }
        };

        let entry = match self
            .options
            .serializer
            .deserialize(&bytes)
            .and_then(|value| Ok(serde_json::from_value::<CacheEntry>(value)?))
        {
            Ok(entry) => entry,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to decode cache file");
                return None;
            }
        };

        if entry.is_expired(self.options.now()) {
            debug!(key, "evicted expired cache file");
            if let Err(err) = self.store.delete(&file).await {
                warn!(file = %file.display(), error = %err, "failed to remove expired cache file");
            }
            return None;
        }
        Some(entry)
    }

    async fn store_entry(&self, key: &str, value: Value, expire_at: i64) -> bool {
        let file = self.cache_file(key);
        let entry = CacheEntry::new(value, expire_at);

        let bytes = match serde_json::to_value(&entry)
            .map_err(Into::into)
            .and_then(|value| self.options.serializer.serialize(&value))
        {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, error = %err, "failed to encode cache entry");
                return false;
            }
        };

        match self.store.write(&file, &bytes).await {
            Ok(()) => true,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to write cache file");
                false
            }
        }
    }

    async fn remove(&self, key: &str) -> bool {
        let file = self.cache_file(key);
        match self.store.delete(&file).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to remove cache file");
                false
            }
        }
    }

    /// Deletes files under the prefix accepted by `select`, given each file's
    /// modification time in unix seconds.
    async fn sweep<F>(&self, select: F) -> bool
    where
        F: Fn(i64) -> bool + Send,
    {
        let files = match self.store.list(&self.save_path, &self.options.prefix).await {
            Ok(files) => files,
            Err(err) => {
                warn!(dir = %self.save_path.display(), error = %err, "failed to list cache files");
                return false;
            }
        };

        let mut removed = 0usize;
        let mut ok = true;
        for file in files {
            let modified = file
                .modified
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_secs() as i64;
            if !select(modified) {
                continue;
            }
            match self.store.delete(&file.path).await {
                Ok(_) => removed += 1,
                Err(err) => {
                    warn!(file = %file.path.display(), error = %err, "failed to remove cache file");
                    ok = false;
                }
            }
        }
        debug!(dir = %self.save_path.display(), removed, "cache file sweep finished");
        ok
    }
}

#[async_trait]
impl CacheAdapter for MultiFileAdapter {
    fn name(&self) -> &'static str {
        "multi_file"
    }

    async fn init(&self) -> Result<()> {
        self.store.create_dir(&self.save_path).await?;
        info!(dir = %self.save_path.display(), "cache directory ready");
        Ok(())
    }

    async fn get(&self, key: &str, default: Value) -> Result<Value> {
        check_key(key)?;
        Ok(self
            .load(key)
            .await
            .map_or(default, |entry| entry.payload))
    }

    async fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<bool> {
        check_key(key)?;
        let expire_at = ttl.expire_at(self.options.now())?;
        Ok(self.store_entry(key, value, expire_at).await)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.load(key).await.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.remove(key).await)
    }

    async fn clear(&self) -> Result<bool> {
        Ok(self.sweep(|_| true).await)
    }

    async fn get_multiple(&self, keys: &[&str], default: Value) -> Result<ValueMap> {
        check_keys(keys.iter().copied())?;

        let mut values = ValueMap::with_capacity(keys.len());
        for key in keys {
            let value = self
                .load(key)
                .await
                .map_or_else(|| default.clone(), |entry| entry.payload);
            values.insert((*key).to_string(), value);
        }
        Ok(values)
    }

    async fn set_multiple(&self, values: ValueMap, ttl: Ttl) -> Result<bool> {
        check_keys(values.keys().map(String::as_str))?;
        let expire_at = ttl.expire_at(self.options.now())?;

        let mut ok = true;
        for (key, value) in values {
            ok &= self.store_entry(&key, value, expire_at).await;
        }
        Ok(ok)
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        check_keys(keys.iter().copied())?;

        for key in keys {
            self.remove(key).await;
        }
        Ok(true)
    }

    /// Deletes files not modified within the last `max_lifetime` seconds,
    /// independent of the expiry recorded inside each file.
    async fn gc(&self, max_lifetime: u64) -> Result<bool> {
        let now = self.options.now();
        let max_lifetime = i64::try_from(max_lifetime).unwrap_or(i64::MAX);
        Ok(self
            .sweep(|modified| modified.saturating_add(max_lifetime) < now)
            .await)
    }
}
