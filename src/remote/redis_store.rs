//! Redis implementation of the remote protocol.

use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::info;

use super::RemoteStore;
use crate::error::{CacheError, Result};

/// Redis client over a `ConnectionManager`: one multiplexed connection that
/// reconnects on failure and is shared by every clone.
#[derive(Clone)]
pub struct RedisStore {
    url: String,
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| CacheError::Remote(format!("Failed to create Redis client: {e}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Remote(format!("Failed to connect to Redis: {e}")))?;

        info!(url, "connected to redis");
        Ok(Self {
            url: url.to_string(),
            connection,
        })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64) -> Result<bool> {
        let mut conn = self.connection();
        let result: redis::RedisResult<()> = if ttl > 0 {
            conn.set_ex(key, value, ttl).await
        } else {
            conn.set(key, value).await
        };
        result?;
        Ok(true)
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection();
        let values: Vec<Option<Vec<u8>>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    /// Plain MSET cannot carry an expiry, so the SETs go out as one atomic
    /// pipeline.
    async fn mset(&self, values: Vec<(String, Vec<u8>)>, ttl: u64) -> Result<bool> {
        if values.is_empty() {
            return Ok(true);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in values {
            if ttl > 0 {
                pipe.set_ex(key, value, ttl).ignore();
            } else {
                pipe.set(key, value).ignore();
            }
        }

        let mut conn = self.connection();
        let () = pipe.query_async(&mut conn).await?;
        Ok(true)
    }
}
