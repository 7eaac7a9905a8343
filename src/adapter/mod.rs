//! Adapter Module
//!
//! The uniform cache contract and its backends.
//!
//! # Backends
//! - [`MemoryAdapter`]: process-local map
//! - [`FileAdapter`]: whole cache in one snapshot file
//! - [`MultiFileAdapter`]: one file per key
//! - [`TableAdapter`]: fixed-capacity table shared across processes
//! - [`RemoteAdapter`]: network key-value service
//!
//! Batch operations are not atomic: every key is applied independently and
//! siblings that already succeeded stay applied when a later key fails.

mod file;
mod memory;
mod multi_file;
mod remote;
mod table;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::cache::{Clock, JsonSerializer, Serializer, SystemClock, Ttl, DEFAULT_PREFIX};
use crate::error::Result;

pub use file::FileAdapter;
pub use memory::MemoryAdapter;
pub use multi_file::MultiFileAdapter;
pub use remote::RemoteAdapter;
pub use table::{TableAdapter, TableOptions};

/// Ordered result of `get_multiple`, in request order.
pub type ValueMap = IndexMap<String, Value>;

// == Cache Adapter Contract ==
/// Operations every backend implements.
///
/// Validation errors are returned as `Err`. Local storage failures of a
/// mutation are reported as `Ok(false)`, and local read failures as misses.
#[async_trait]
pub trait CacheAdapter: Send + Sync + Debug {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Loads persisted state before first use.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Flushes state to durable storage where applicable.
    async fn close(&self) -> Result<bool> {
        Ok(true)
    }

    /// Returns the stored value, or `default` on miss or expiry.
    async fn get(&self, key: &str, default: Value) -> Result<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<bool>;

    /// Presence check; expired entries are absent.
    async fn has(&self, key: &str) -> Result<bool>;

    /// `true` if an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn clear(&self) -> Result<bool>;

    async fn get_multiple(&self, keys: &[&str], default: Value) -> Result<ValueMap>;

    /// `true` iff every entry was stored.
    async fn set_multiple(&self, values: ValueMap, ttl: Ttl) -> Result<bool>;

    async fn delete_multiple(&self, keys: &[&str]) -> Result<bool>;

    /// Reclaims entries older than `max_lifetime` seconds.
    async fn gc(&self, _max_lifetime: u64) -> Result<bool> {
        Ok(true)
    }
}

// == Adapter Options ==
/// Settings common to every adapter.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Namespace prepended to every key
    pub prefix: String,
    /// Value codec
    pub serializer: Arc<dyn Serializer>,
    /// Time source for expiration
    pub clock: Arc<dyn Clock>,
    /// Reserved; payload encryption is not implemented
    pub encrypt: bool,
}

impl AdapterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Prefixed key as stored in the backend.
    pub fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Logs once per adapter when the reserved encryption flag is set.
    fn warn_if_encrypt(&self, adapter: &str) {
        if self.encrypt {
            warn!(adapter, "payload encryption is not implemented, storing plaintext");
        }
    }
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            serializer: Arc::new(JsonSerializer),
            clock: Arc::new(SystemClock),
            encrypt: false,
        }
    }
}
