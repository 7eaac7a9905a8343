//! Configuration Module
//!
//! Loads the adapter selection, adapter settings and server parameters from
//! environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::adapter::TableOptions;
use crate::cache::{DEFAULT_PREFIX, DEFAULT_REMOTE_PREFIX};
use crate::error::{CacheError, Result};

/// Remote store URL used when `CACHE_REDIS_URL` is unset
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

// == Adapter Kind ==
/// Backend selected by `CACHE_ADAPTER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterKind {
    #[default]
    Memory,
    File,
    MultiFile,
    Table,
    Redis,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Memory => "memory",
            AdapterKind::File => "file",
            AdapterKind::MultiFile => "multi_file",
            AdapterKind::Table => "table",
            AdapterKind::Redis => "redis",
        }
    }
}

impl FromStr for AdapterKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "array" => Ok(AdapterKind::Memory),
            "file" => Ok(AdapterKind::File),
            "multi_file" | "multi-file" => Ok(AdapterKind::MultiFile),
            "table" => Ok(AdapterKind::Table),
            "redis" => Ok(AdapterKind::Redis),
            other => Err(CacheError::Config(format!("unknown adapter '{other}'"))),
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Config ==
/// Server and cache configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which backend the manager builds
    pub adapter: AdapterKind,
    /// Key prefix; `None` uses the backend's default
    pub prefix: Option<String>,
    /// File adapters use tokio file I/O instead of blocking calls
    pub async_io: bool,
    /// Reserved flag passed to every adapter
    pub encrypt: bool,
    /// Snapshot file of the single-file adapter
    pub data_file: Option<PathBuf>,
    /// Directory of the multi-file adapter
    pub save_path: Option<PathBuf>,
    /// Shared table settings
    pub table: TableOptions,
    /// Remote store URL
    pub redis_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between gc passes; 0 disables the task
    pub gc_interval: u64,
    /// Lifetime handed to `gc`
    pub gc_max_lifetime: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ADAPTER` - memory, file, multi_file, table or redis (default: memory)
    /// - `CACHE_PREFIX` - key prefix (default: `cache_`, `cache:` for redis)
    /// - `CACHE_ASYNC_IO` - tokio file I/O (default: false)
    /// - `CACHE_ENCRYPT` - reserved (default: false)
    /// - `CACHE_DATA_FILE` - single-file snapshot path (required for file)
    /// - `CACHE_SAVE_PATH` - multi-file directory
    /// - `CACHE_TABLE_NAME`, `CACHE_TABLE_DIR`, `CACHE_TABLE_CAPACITY`,
    ///   `CACHE_TABLE_KEY_WIDTH`, `CACHE_TABLE_VALUE_WIDTH`, `CACHE_SNAPSHOT_FILE`
    /// - `CACHE_REDIS_URL` - remote store URL (default: redis://127.0.0.1:6379)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `GC_INTERVAL` - gc frequency in seconds (default: 0, disabled)
    /// - `GC_MAX_LIFETIME` - gc lifetime in seconds (default: 3600)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |name: &str| lookup(name).map(|v| parse_flag(&v)).unwrap_or(false);
        let path = |name: &str| lookup(name).filter(|v| !v.is_empty()).map(PathBuf::from);

        let adapter = match lookup("CACHE_ADAPTER") {
            Some(value) => value.parse()?,
            None => defaults.adapter,
        };

        let table = TableOptions {
            name: lookup("CACHE_TABLE_NAME").unwrap_or(defaults.table.name),
            dir: path("CACHE_TABLE_DIR"),
            capacity: parsed(&lookup, "CACHE_TABLE_CAPACITY").unwrap_or(defaults.table.capacity),
            key_width: parsed(&lookup, "CACHE_TABLE_KEY_WIDTH")
                .unwrap_or(defaults.table.key_width),
            value_width: parsed(&lookup, "CACHE_TABLE_VALUE_WIDTH")
                .unwrap_or(defaults.table.value_width),
            snapshot_file: path("CACHE_SNAPSHOT_FILE"),
        };

        let config = Self {
            adapter,
            prefix: lookup("CACHE_PREFIX"),
            async_io: flag("CACHE_ASYNC_IO"),
            encrypt: flag("CACHE_ENCRYPT"),
            data_file: path("CACHE_DATA_FILE"),
            save_path: path("CACHE_SAVE_PATH"),
            table,
            redis_url: lookup("CACHE_REDIS_URL").unwrap_or(defaults.redis_url),
            server_port: parsed(&lookup, "SERVER_PORT").unwrap_or(defaults.server_port),
            gc_interval: parsed(&lookup, "GC_INTERVAL").unwrap_or(defaults.gc_interval),
            gc_max_lifetime: parsed(&lookup, "GC_MAX_LIFETIME").unwrap_or(defaults.gc_max_lifetime),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations no adapter can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.adapter == AdapterKind::File && self.data_file.is_none() {
            return Err(CacheError::Config(
                "the file adapter requires CACHE_DATA_FILE".to_string(),
            ));
        }
        if self.adapter == AdapterKind::Table {
            self.table
                .layout()
                .validate()
                .map_err(|e| CacheError::Config(e.to_string()))?;
        }
        Ok(())
    }

    /// Configured prefix, or the default of the selected backend.
    pub fn prefix(&self) -> &str {
        match (&self.prefix, self.adapter) {
            (Some(prefix), _) => prefix,
            (None, AdapterKind::Redis) => DEFAULT_REMOTE_PREFIX,
            (None, _) => DEFAULT_PREFIX,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter: AdapterKind::Memory,
            prefix: None,
            async_io: false,
            encrypt: false,
            data_file: None,
            save_path: None,
            table: TableOptions::default(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            server_port: 3000,
            gc_interval: 0,
            gc_max_lifetime: 3600,
        }
    }
}

fn parsed<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
