//! Cache Core - a uniform key-value cache contract with pluggable backends
//!
//! Provides TTL expiration, batch operations and interchangeable storage:
//! process memory, a snapshot file, one file per key, a shared-memory table
//! and a Redis server. Session handlers store raw session strings over the
//! table and the remote store.

pub mod adapter;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod manager;
pub mod models;
pub mod remote;
pub mod store;
pub mod table;
pub mod tasks;

pub use adapter::{AdapterOptions, CacheAdapter, ValueMap};
pub use api::AppState;
pub use cache::Ttl;
pub use config::Config;
pub use error::{CacheError, Result};
pub use handler::{HandlerOptions, SessionHandler};
pub use manager::CacheManager;
pub use tasks::spawn_gc_task;
