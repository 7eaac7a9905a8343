//! Shared-Memory Table Adapter
//!
//! Stores entries as rows of a [`SharedTable`] so that every worker process
//! mapping the same table sees the same cache. Optionally dumps the table to
//! a snapshot file on close and restores it when the table is first created.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{AdapterOptions, CacheAdapter, ValueMap};
use crate::cache::{check_key, check_keys, is_expired, snapshot, CacheEntry, Snapshot, Ttl};
use crate::error::Result;
use crate::store::ByteStore;
use crate::table::{SharedTable, TableError, TableLayout};

pub const DEFAULT_TABLE_NAME: &str = "cache-table";
pub const DEFAULT_CAPACITY: u32 = 1024;
pub const DEFAULT_KEY_WIDTH: u32 = 128;
pub const DEFAULT_VALUE_WIDTH: u32 = 10240;

// == Table Options ==
/// Where the table lives and how big its rows are.
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub name: String,
    /// Directory holding the table file; `None` picks `/dev/shm` when present
    pub dir: Option<PathBuf>,
    pub capacity: u32,
    pub key_width: u32,
    pub value_width: u32,
    /// Dump/restore target
    pub snapshot_file: Option<PathBuf>,
}

impl TableOptions {
    pub fn layout(&self) -> TableLayout {
        TableLayout::new(self.capacity, self.key_width, self.value_width)
    }

    pub fn table_path(&self) -> PathBuf {
        let dir = self.dir.clone().unwrap_or_else(default_table_dir);
        dir.join(format!("{}.table", self.name))
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            dir: None,
            capacity: DEFAULT_CAPACITY,
            key_width: DEFAULT_KEY_WIDTH,
            value_width: DEFAULT_VALUE_WIDTH,
            snapshot_file: None,
        }
    }
}

fn default_table_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

// == Table Adapter ==
#[derive(Debug)]
pub struct TableAdapter {
    options: AdapterOptions,
    table: SharedTable,
    /// This handle formatted the table rather than attaching to it
    created: bool,
    snapshot_file: Option<PathBuf>,
    store: Arc<dyn ByteStore>,
}

impl TableAdapter {
    /// Creates the table, or attaches to it when another process already did.
    pub fn new(
        options: AdapterOptions,
        table_options: TableOptions,
        store: Arc<dyn ByteStore>,
    ) -> Result<Self> {
        options.warn_if_encrypt("table");
        let (table, created) =
            SharedTable::open_or_create(table_options.table_path(), table_options.layout())?;

        Ok(Self {
            options,
            table,
            created,
            snapshot_file: table_options.snapshot_file,
            store,
        })
    }

    pub fn table(&self) -> &SharedTable {
        &self.table
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Option<Value> {
        match self.options.serializer.deserialize(bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "failed to decode table row");
                None
            }
        }
    }

    fn write_row(&self, key: &str, value: &Value, expire_at: i64) -> bool {
        let cache_key = self.options.cache_key(key);
        let bytes = match self.options.serializer.serialize(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, error = %err, "failed to encode table row");
                return false;
            }
        };

        let written_at = self.options.now();
        match self.table.set(cache_key.as_bytes(), expire_at, written_at, &bytes) {
            Ok(()) => true,
            Err(err) => {
                // An oversized value must not leave the previous one readable
                if matches!(err, TableError::ValueTooLong { .. }) {
                    self.table.delete(cache_key.as_bytes());
                }
                warn!(key, error = %err, "table row rejected");
                false
            }
        }
    }

    fn read_row(&self, key: &str) -> Option<Value> {
        let cache_key = self.options.cache_key(key);
        let row = self.table.get(cache_key.as_bytes(), self.options.now())?;
        self.decode(key, &row.value)
    }

    /// Live rows under this adapter's prefix, decoded into a snapshot.
    fn dump(&self) -> Snapshot {
        let prefix = self.options.prefix.as_bytes();
        let now = self.options.now();

        self.table
            .rows()
            .into_iter()
            .filter(|(key, row)| key.starts_with(prefix) && !is_expired(row.expire_at, now))
            .filter_map(|(key, row)| {
                let key = String::from_utf8(key).ok()?;
                let payload = self.decode(&key, &row.value)?;
                Some((
                    key,
                    CacheEntry {
                        expire_at: row.expire_at,
                        payload,
                    },
                ))
            })
            .collect()
    }

    fn restore(&self, snapshot: Snapshot) -> usize {
        let now = self.options.now();
        let mut restored = 0;

        for (key, entry) in snapshot {
            if entry.is_expired(now) {
                continue;
            }
            let written = self
                .options
                .serializer
                .serialize(&entry.payload)
                .map_err(|err| err.to_string())
                .and_then(|bytes| {
                    self.table
                        .set(key.as_bytes(), entry.expire_at, now, &bytes)
                        .map_err(|err| err.to_string())
                });
            match written {
                Ok(()) => restored += 1,
                Err(error) => warn!(key = %key, error = %error, "skipped snapshot row"),
            }
        }
        restored
    }
}

#[async_trait]
impl CacheAdapter for TableAdapter {
    fn name(&self) -> &'static str {
        "table"
    }

    /// Restores the snapshot, only when this handle created the table.
    async fn init(&self) -> Result<()> {
        let Some(file) = self.snapshot_file.as_deref() else {
            return Ok(());
        };
        if !self.created {
            debug!(
                path = %self.table.path().display(),
                "attached to existing table, skipping restore"
            );
            return Ok(());
        }
        let Some(bytes) = self.store.read(file).await? else {
            return Ok(());
        };

        let loaded = snapshot::decode(self.options.serializer.as_ref(), &bytes)?;
        let restored = self.restore(loaded);
        info!(file = %file.display(), restored, "table restored from snapshot");
        Ok(())
    }

    /// Dumps the table when a snapshot file is configured.
    async fn close(&self) -> Result<bool> {
        let Some(file) = self.snapshot_file.as_deref() else {
            return Ok(true);
        };

        let dumped = self.dump();
        let bytes = match snapshot::encode(self.options.serializer.as_ref(), &dumped) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to encode table snapshot");
                return Ok(false);
            }
        };

        match self.store.write(file, &bytes).await {
            Ok(()) => {
                info!(file = %file.display(), entries = dumped.len(), "table dumped to snapshot");
                Ok(true)
            }
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to write table snapshot");
                Ok(false)
            }
        }
    }

    async fn get(&self, key: &str, default: Value) -> Result<Value> {
        check_key(key)?;
        Ok(self.read_row(key).unwrap_or(default))
    }

    async fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<bool> {
        check_key(key)?;
        let expire_at = ttl.expire_at(self.options.now())?;
        Ok(self.write_row(key, &value, expire_at))
    }

    async fn has(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        let cache_key = self.options.cache_key(key);
        Ok(self.table.exists(cache_key.as_bytes(), self.options.now()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.table.delete(self.options.cache_key(key).as_bytes()))
    }

    /// Removes every row under this adapter's prefix.
    async fn clear(&self) -> Result<bool> {
        let prefix = self.options.prefix.as_bytes();
        let removed = self.table.retain(|key, _, _| !key.starts_with(prefix));
        debug!(removed, "table cleared");
        Ok(true)
    }

    async fn get_multiple(&self, keys: &[&str], default: Value) -> Result<ValueMap> {
        check_keys(keys.iter().copied())?;
        Ok(keys
            .iter()
            .map(|key| {
                let value = self.read_row(key).unwrap_or_else(|| default.clone());
                ((*key).to_string(), value)
            })
            .collect())
    }

    async fn set_multiple(&self, values: ValueMap, ttl: Ttl) -> Result<bool> {
        check_keys(values.keys().map(String::as_str))?;
        let expire_at = ttl.expire_at(self.options.now())?;

        let mut ok = true;
        for (key, value) in &values {
            ok &= self.write_row(key, value, expire_at);
        }
        Ok(ok)
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        check_keys(keys.iter().copied())?;
        for key in keys {
            self.table.delete(self.options.cache_key(key).as_bytes());
        }
        Ok(true)
    }

    /// Frees rows whose recorded expiry has passed. Entries already carry
    /// their own lifetime, so `max_lifetime` does not apply here.
    async fn gc(&self, _max_lifetime: u64) -> Result<bool> {
        let prefix = self.options.prefix.as_bytes();
        let now = self.options.now();
        let removed = self
            .table
            .retain(|key, expire_at, _| !(key.starts_with(prefix) && is_expired(expire_at, now)));
        debug!(removed, "expired table rows reclaimed");
        Ok(true)
    }
}
