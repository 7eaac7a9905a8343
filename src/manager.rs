//! Cache Manager
//!
//! Facade over the configured adapter. Holds exactly one backend and
//! forwards every call to it.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::adapter::{
    AdapterOptions, CacheAdapter, FileAdapter, MemoryAdapter, MultiFileAdapter, RemoteAdapter,
    TableAdapter, ValueMap,
};
use crate::cache::Ttl;
use crate::config::{AdapterKind, Config};
use crate::error::{CacheError, Result};
use crate::remote::RedisStore;
use crate::store::{AsyncFileStore, BlockingFileStore, ByteStore};

/// Shared handle to one cache backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CacheManager {
    adapter: Arc<dyn CacheAdapter>,
}

impl CacheManager {
    pub fn new(adapter: Arc<dyn CacheAdapter>) -> Self {
        Self { adapter }
    }

    /// Builds the backend selected by `config`. Does not call `init`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let options = AdapterOptions::new()
            .with_prefix(config.prefix())
            .with_encrypt(config.encrypt);
        let store: Arc<dyn ByteStore> = if config.async_io {
            Arc::new(AsyncFileStore)
        } else {
            Arc::new(BlockingFileStore)
        };

        let adapter: Arc<dyn CacheAdapter> = match config.adapter {
            AdapterKind::Memory => Arc::new(MemoryAdapter::new(options)),
            AdapterKind::File => {
                let data_file = config.data_file.clone().ok_or_else(|| {
                    CacheError::Config("the file adapter requires CACHE_DATA_FILE".to_string())
                })?;
                Arc::new(FileAdapter::new(options, data_file, store))
            }
            AdapterKind::MultiFile => Arc::new(MultiFileAdapter::new(
                options,
                config.save_path.clone(),
                store,
            )),
            AdapterKind::Table => {
                Arc::new(TableAdapter::new(options, config.table.clone(), store)?)
            }
            AdapterKind::Redis => {
                let remote = RedisStore::connect(&config.redis_url).await?;
                Arc::new(RemoteAdapter::new(options, Arc::new(remote)))
            }
        };

        info!(adapter = adapter.name(), prefix = config.prefix(), "cache adapter selected");
        Ok(Self::new(adapter))
    }

    pub fn adapter(&self) -> &Arc<dyn CacheAdapter> {
        &self.adapter
    }

    pub async fn init(&self) -> Result<()> {
        self.adapter.init().await
    }

    pub async fn close(&self) -> Result<bool> {
        self.adapter.close().await
    }

    pub async fn get(&self, key: &str, default: Value) -> Result<Value> {
        self.adapter.get(key, default).await
    }

    pub async fn set(&self, key: &str, value: Value, ttl: impl Into<Ttl>) -> Result<bool> {
        self.adapter.set(key, value, ttl.into()).await
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        self.adapter.has(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.adapter.delete(key).await
    }

    pub async fn clear(&self) -> Result<bool> {
        self.adapter.clear().await
    }

    pub async fn get_multiple(&self, keys: &[&str], default: Value) -> Result<ValueMap> {
        self.adapter.get_multiple(keys, default).await
    }

    pub async fn set_multiple(&self, values: ValueMap, ttl: impl Into<Ttl>) -> Result<bool> {
        self.adapter.set_multiple(values, ttl.into()).await
    }

    pub async fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        self.adapter.delete_multiple(keys).await
    }

    pub async fn gc(&self, max_lifetime: u64) -> Result<bool> {
        self.adapter.gc(max_lifetime).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TableOptions;
    use serde_json::json;

    #[tokio::test]
    async fn test_forwards_to_adapter() {
        let manager = CacheManager::new(Arc::new(MemoryAdapter::default()));

        assert!(manager.set("k", json!("v"), 60).await.unwrap());
        assert!(manager.has("k").await.unwrap());
        assert_eq!(manager.get("k", json!(null)).await.unwrap(), json!("v"));
        assert!(manager.delete("k").await.unwrap());
        assert_eq!(manager.get("k", json!("D")).await.unwrap(), json!("D"));
        assert_eq!(manager.adapter().name(), "memory");
    }

    #[tokio::test]
    async fn test_from_config_memory() {
        let manager = CacheManager::from_config(&Config::default()).await.unwrap();
        assert_eq!(manager.adapter().name(), "memory");
    }

    #[tokio::test]
    async fn test_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            adapter: AdapterKind::File,
            data_file: Some(dir.path().join("cache.json")),
            async_io: true,
            ..Config::default()
        };

        let manager = CacheManager::from_config(&config).await.unwrap();
        manager.init().await.unwrap();
        assert_eq!(manager.adapter().name(), "file");
        assert!(manager.set("k", json!(1), Ttl::Never).await.unwrap());
        assert!(dir.path().join("cache.json").exists());
    }

    #[tokio::test]
    async fn test_from_config_multi_file_and_table() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config {
            adapter: AdapterKind::MultiFile,
            save_path: Some(dir.path().join("files")),
            ..Config::default()
        };
        let manager = CacheManager::from_config(&config).await.unwrap();
        assert_eq!(manager.adapter().name(), "multi_file");

        let config = Config {
            adapter: AdapterKind::Table,
            table: TableOptions {
                dir: Some(dir.path().to_path_buf()),
                capacity: 8,
                ..TableOptions::default()
            },
            ..Config::default()
        };
        let manager = CacheManager::from_config(&config).await.unwrap();
        assert_eq!(manager.adapter().name(), "table");
    }

    #[tokio::test]
    async fn test_from_config_rejects_file_without_path() {
        let config = Config {
            adapter: AdapterKind::File,
            ..Config::default()
        };
        assert!(matches!(
            CacheManager::from_config(&config).await,
            Err(CacheError::Config(_))
        ));
    }
}
