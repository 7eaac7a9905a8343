//! Shared-Table Session Handler
//!
//! Sessions are rows of a [`SharedTable`] holding the raw session string and
//! the second it was written. Staleness is judged from that write time, so a
//! row never carries an expiry of its own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{outlived, session_text, HandlerOptions, SessionHandler};
use crate::adapter::TableOptions;
use crate::cache::check_key;
use crate::error::{CacheError, Result};
use crate::store::ByteStore;
use crate::table::{SharedTable, TableError};

pub const DEFAULT_SESSION_TABLE: &str = "session-table";
pub const DEFAULT_SESSION_CAPACITY: u32 = 10240;

/// One dumped session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SessionRecord {
    written_at: i64,
    data: String,
}

#[derive(Debug)]
pub struct TableHandler {
    options: HandlerOptions,
    table_options: TableOptions,
    store: Arc<dyn ByteStore>,
    table: RwLock<Option<SharedTable>>,
}

impl TableHandler {
    /// Nothing is mapped until [`SessionHandler::open`].
    pub fn new(
        options: HandlerOptions,
        table_options: TableOptions,
        store: Arc<dyn ByteStore>,
    ) -> Self {
        Self {
            options,
            table_options,
            store,
            table: RwLock::new(None),
        }
    }

    /// Table settings sized for sessions: 10240 rows of up to 10240 bytes.
    pub fn default_table_options() -> TableOptions {
        TableOptions {
            name: DEFAULT_SESSION_TABLE.to_string(),
            capacity: DEFAULT_SESSION_CAPACITY,
            ..TableOptions::default()
        }
    }

    fn dump(&self, table: &SharedTable) -> BTreeMap<String, SessionRecord> {
        let prefix = self.options.prefix.as_bytes();
        table
            .rows()
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, row)| {
                let key = String::from_utf8(key).ok()?;
                let data = String::from_utf8(row.value).ok()?;
                Some((
                    key,
                    SessionRecord {
                        written_at: row.written_at,
                        data,
                    },
                ))
            })
            .collect()
    }

    async fn restore(&self, table: &SharedTable, file: &Path) -> Result<()> {
        let Some(bytes) = self.store.read(file).await? else {
            return Ok(());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let records: BTreeMap<String, SessionRecord> = serde_json::from_slice(&bytes)?;
        let mut restored = 0;
        for (key, record) in records {
            match table.set(key.as_bytes(), 0, record.written_at, record.data.as_bytes()) {
                Ok(()) => restored += 1,
                Err(err) => warn!(key = %key, error = %err, "skipped session row"),
            }
        }
        info!(file = %file.display(), restored, "sessions restored from snapshot");
        Ok(())
    }
}

#[async_trait]
impl SessionHandler for TableHandler {
    fn name(&self) -> &'static str {
        "table"
    }

    /// Maps the table at `<save_path>/<name>.table`, creating it when it does
    /// not exist. Only the creating handle restores the snapshot.
    async fn open(&self, save_path: &str, name: &str) -> Result<bool> {
        let mut table_options = self.table_options.clone();
        if !save_path.is_empty() {
            table_options.dir = Some(PathBuf::from(save_path));
        }
        if !name.is_empty() {
            table_options.name = name.to_string();
        }

        let (table, created) =
            SharedTable::open_or_create(table_options.table_path(), table_options.layout())?;
        if created {
            if let Some(file) = table_options.snapshot_file.as_deref() {
                self.restore(&table, file).await?;
            }
        }
        debug!(path = %table.path().display(), created, "session table opened");

        *self.table.write().await = Some(table);
        Ok(true)
    }

    /// Dumps the sessions when a snapshot file is configured. The table
    /// stays mapped for other workers.
    async fn close(&self) -> Result<bool> {
        let Some(file) = self.table_options.snapshot_file.as_deref() else {
            return Ok(true);
        };
        let guard = self.table.read().await;
        let Some(table) = guard.as_ref() else {
            return Ok(true);
        };

        let records = self.dump(table);
        let bytes = serde_json::to_vec(&records)?;
        match self.store.write(file, &bytes).await {
            Ok(()) => {
                info!(file = %file.display(), sessions = records.len(), "sessions dumped");
                Ok(true)
            }
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to write session snapshot");
                Ok(false)
            }
        }
    }

    async fn read(&self, id: &str) -> Result<String> {
        check_key(id)?;
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(CacheError::HandlerClosed)?;

        let key = self.options.session_key(id);
        let now = self.options.now();
        let Some(row) = table.get(key.as_bytes(), now) else {
            return Ok(String::new());
        };
        if outlived(row.written_at, self.options.lifetime, now) {
            table.delete(key.as_bytes());
            debug!(id, "evicted stale session");
            return Ok(String::new());
        }
        Ok(session_text(id, row.value))
    }

    async fn write(&self, id: &str, data: &str) -> Result<bool> {
        check_key(id)?;
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(CacheError::HandlerClosed)?;

        let key = self.options.session_key(id);
        match table.set(key.as_bytes(), 0, self.options.now(), data.as_bytes()) {
            Ok(()) => Ok(true),
            Err(err) => {
                // Never leave older data readable after a rejected write
                if matches!(err, TableError::ValueTooLong { .. }) {
                    table.delete(key.as_bytes());
                }
                warn!(id, error = %err, "session row rejected");
                Ok(false)
            }
        }
    }

    async fn destroy(&self, id: &str) -> Result<bool> {
        check_key(id)?;
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(CacheError::HandlerClosed)?;
        Ok(table.delete(self.options.session_key(id).as_bytes()))
    }

    async fn gc(&self, max_lifetime: u64) -> Result<bool> {
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(CacheError::HandlerClosed)?;

        let prefix = self.options.prefix.as_bytes();
        let now = self.options.now();
        let removed = table.retain(|key, _, written_at| {
            !(key.starts_with(prefix) && outlived(written_at, max_lifetime, now))
        });
        debug!(removed, "stale sessions reclaimed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::store::BlockingFileStore;

    fn table_options(snapshot_file: Option<PathBuf>) -> TableOptions {
        TableOptions {
            capacity: 32,
            key_width: 64,
            value_width: 64,
            snapshot_file,
            ..TableHandler::default_table_options()
        }
    }

    fn handler(clock: Arc<ManualClock>, snapshot_file: Option<PathBuf>) -> TableHandler {
        TableHandler::new(
            HandlerOptions::new().with_lifetime(60).with_clock(clock),
            table_options(snapshot_file),
            Arc::new(BlockingFileStore),
        )
    }

    fn save_path(dir: &Path) -> &str {
        dir.to_str().unwrap()
    }

    #[tokio::test]
    async fn test_requires_open() {
        let handler = handler(Arc::new(ManualClock::new(0)), None);

        assert!(matches!(handler.read("sid").await, Err(CacheError::HandlerClosed)));
        assert!(matches!(handler.write("sid", "x").await, Err(CacheError::HandlerClosed)));
        assert!(matches!(handler.gc(10).await, Err(CacheError::HandlerClosed)));
    }

    #[tokio::test]
    async fn test_write_read_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(Arc::new(ManualClock::new(1_000)), None);
        assert!(handler.open(save_path(dir.path()), "sessions").await.unwrap());
        assert!(dir.path().join("sessions.table").exists());
        assert_eq!(handler.name(), "table");

        assert!(handler.write("sid", "user=7").await.unwrap());
        assert_eq!(handler.read("sid").await.unwrap(), "user=7");
        assert_eq!(handler.read("other").await.unwrap(), "");

        assert!(handler.destroy("sid").await.unwrap());
        assert!(!handler.destroy("sid").await.unwrap());
        assert_eq!(handler.read("sid").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_lifetime_counts_from_last_write() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let handler = handler(clock.clone(), None);
        handler.open(save_path(dir.path()), "").await.unwrap();

        handler.write("sid", "v1").await.unwrap();
        clock.advance(50);
        handler.write("sid", "v2").await.unwrap();

        clock.advance(60);
        assert_eq!(handler.read("sid").await.unwrap(), "v2");

        clock.advance(1);
        assert_eq!(handler.read("sid").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_gc_uses_write_time() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let handler = handler(clock.clone(), None);
        handler.open(save_path(dir.path()), "").await.unwrap();

        handler.write("old", "a").await.unwrap();
        clock.advance(100);
        handler.write("new", "b").await.unwrap();
        clock.advance(10);

        assert!(handler.gc(50).await.unwrap());
        let guard = handler.table.read().await;
        let table = guard.as_ref().unwrap();
        assert!(table.get(b"cache_old", 0).is_none());
        assert_eq!(table.get(b"cache_new", 0).unwrap().value, b"b");
    }

    #[tokio::test]
    async fn test_oversized_write_drops_previous_data() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(Arc::new(ManualClock::new(0)), None);
        handler.open(save_path(dir.path()), "").await.unwrap();

        handler.write("sid", "small").await.unwrap();
        assert!(!handler.write("sid", &"x".repeat(65)).await.unwrap());
        assert_eq!(handler.read("sid").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_snapshot_dump_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("sessions.json");
        let clock = Arc::new(ManualClock::new(1_000));

        let first = handler(clock.clone(), Some(snapshot.clone()));
        first.open(save_path(dir.path()), "").await.unwrap();
        first.write("sid", "kept").await.unwrap();
        assert!(first.close().await.unwrap());
        drop(first);

        // Fresh boot: the table file is gone, the snapshot is not
        std::fs::remove_file(dir.path().join(format!("{DEFAULT_SESSION_TABLE}.table"))).unwrap();

        clock.advance(30);
        let second = handler(clock.clone(), Some(snapshot));
        second.open(save_path(dir.path()), "").await.unwrap();
        assert_eq!(second.read("sid").await.unwrap(), "kept");

        // The restored row keeps its original write time
        clock.advance(31);
        assert_eq!(second.read("sid").await.unwrap(), "");
    }
}
