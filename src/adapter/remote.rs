//! Remote Adapter
//!
//! Forwards every operation to a [`RemoteStore`]. Expiration is left to the
//! remote service; nothing is tracked locally.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AdapterOptions, CacheAdapter, ValueMap};
use crate::cache::{check_key, check_keys, Ttl, DEFAULT_REMOTE_PREFIX};
use crate::error::Result;
use crate::remote::RemoteStore;

// == Remote Adapter ==
#[derive(Debug)]
pub struct RemoteAdapter {
    options: AdapterOptions,
    store: Arc<dyn RemoteStore>,
}

impl RemoteAdapter {
    pub fn new(options: AdapterOptions, store: Arc<dyn RemoteStore>) -> Self {
        options.warn_if_encrypt("remote");
        Self { options, store }
    }

    /// Options with the remote default prefix (`cache:`).
    pub fn default_options() -> AdapterOptions {
        AdapterOptions::new().with_prefix(DEFAULT_REMOTE_PREFIX)
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Option<Value> {
        match self.options.serializer.deserialize(bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "failed to decode remote value");
                None
            }
        }
    }

    fn encode(&self, key: &str, value: &Value) -> Option<Vec<u8>> {
        match self.options.serializer.serialize(value) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(key, error = %err, "failed to encode remote value");
                None
            }
        }
    }

    fn cache_keys(&self, keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| self.options.cache_key(key)).collect()
    }
}

#[async_trait]
impl CacheAdapter for RemoteAdapter {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &str, default: Value) -> Result<Value> {
        check_key(key)?;
        let bytes = self.store.get(&self.options.cache_key(key)).await?;
        Ok(bytes
            .and_then(|bytes| self.decode(key, &bytes))
            .unwrap_or(default))
    }

    async fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<bool> {
        check_key(key)?;
        let ttl = ttl.normalize(self.options.now())?;
        let Some(bytes) = self.encode(key, &value) else {
            return Ok(false);
        };
        self.store.set(&self.options.cache_key(key), bytes, ttl).await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        self.store.exists(&self.options.cache_key(key)).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let removed = self.store.del(&[self.options.cache_key(key)]).await?;
        Ok(removed == 1)
    }

    /// The remote keyspace may be shared, so nothing is flushed.
    async fn clear(&self) -> Result<bool> {
        debug!("clear is a no-op for the remote adapter");
        Ok(true)
    }

    async fn get_multiple(&self, keys: &[&str], default: Value) -> Result<ValueMap> {
        check_keys(keys.iter().copied())?;
        if keys.is_empty() {
            return Ok(ValueMap::new());
        }

        let found = self.store.mget(&self.cache_keys(keys)).await?;
        let mut values = ValueMap::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let value = found
                .get(index)
                .cloned()
                .flatten()
                .and_then(|bytes| self.decode(key, &bytes))
                .unwrap_or_else(|| default.clone());
            values.insert((*key).to_string(), value);
        }
        Ok(values)
    }

    async fn set_multiple(&self, values: ValueMap, ttl: Ttl) -> Result<bool> {
        check_keys(values.keys().map(String::as_str))?;
        let ttl = ttl.normalize(self.options.now())?;

        let mut encoded = Vec::with_capacity(values.len());
        for (key, value) in &values {
            let Some(bytes) = self.encode(key, value) else {
                return Ok(false);
            };
            encoded.push((self.options.cache_key(key), bytes));
        }
        self.store.mset(encoded, ttl).await
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        check_keys(keys.iter().copied())?;
        if keys.is_empty() {
            return Ok(true);
        }
        let removed = self.store.del(&self.cache_keys(keys)).await?;
        Ok(removed == keys.len() as u64)
    }
}
