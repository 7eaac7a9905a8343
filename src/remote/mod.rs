//! Remote Store Module
//!
//! The key-value protocol the remote adapter speaks, and its Redis client.

mod redis_store;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Result;

pub use redis_store::RedisStore;

/// Minimal remote key-value protocol. Keys arrive already prefixed; a TTL of
/// 0 means no expiration.
#[async_trait]
pub trait RemoteStore: Send + Sync + Debug {
    /// GET; `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// SET with optional expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64) -> Result<bool>;

    /// DEL; returns how many keys were removed.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// MGET; one slot per requested key, in order.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// MSET with a shared expiry.
    async fn mset(&self, values: Vec<(String, Vec<u8>)>, ttl: u64) -> Result<bool>;
}
