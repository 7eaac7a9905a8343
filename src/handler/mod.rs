//! Session Handler Module
//!
//! Raw string storage keyed by session id, over the shared table and the
//! remote store. A session stays readable for `lifetime` seconds after its
//! last write; `gc` drops sessions last written more than `max_lifetime`
//! seconds ago.
//!
//! # Handlers
//! - [`TableHandler`]: rows of a [`SharedTable`](crate::table::SharedTable)
//!   stamped with their write time
//! - [`RemoteHandler`]: keys of a [`RemoteStore`](crate::remote::RemoteStore)
//!   expiring through the service's own TTL

mod remote;
mod table;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::{Clock, SystemClock, DEFAULT_PREFIX};
use crate::error::Result;

pub use remote::RemoteHandler;
pub use table::TableHandler;

/// Seconds a session stays readable after its last write.
pub const DEFAULT_LIFETIME: u64 = 1_440;

// == Session Handler ==
#[async_trait]
pub trait SessionHandler: Send + Sync + Debug {
    /// Short handler name used in logs.
    fn name(&self) -> &'static str;

    /// Attaches to storage. Backends with a location take it from
    /// `save_path` and `name`; empty strings keep the configured ones.
    async fn open(&self, save_path: &str, name: &str) -> Result<bool>;

    async fn close(&self) -> Result<bool>;

    /// Session data, or an empty string when the session is absent or stale.
    async fn read(&self, id: &str) -> Result<String>;

    /// Stores `data` and restarts the session's lifetime.
    async fn write(&self, id: &str, data: &str) -> Result<bool>;

    /// `true` if a session was removed.
    async fn destroy(&self, id: &str) -> Result<bool>;

    /// Removes sessions last written more than `max_lifetime` seconds ago.
    async fn gc(&self, max_lifetime: u64) -> Result<bool>;
}

// == Handler Options ==
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// Namespace prepended to every session id
    pub prefix: String,
    /// Seconds a session stays readable after its last write
    pub lifetime: u64,
    pub clock: Arc<dyn Clock>,
}

impl HandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            lifetime: DEFAULT_LIFETIME,
            clock: Arc::new(SystemClock),
        }
    }
}

/// More than `lifetime` seconds have passed since `written_at`.
fn outlived(written_at: i64, lifetime: u64, now: i64) -> bool {
    u64::try_from(now.saturating_sub(written_at)).is_ok_and(|age| age > lifetime)
}

/// Session bytes as text; anything else reads as an absent session.
fn session_text(id: &str, bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| {
        warn!(id, error = %err, "session data is not valid UTF-8");
        String::new()
    })
}
