//! Shared Table Module
//!
//! Fixed-capacity, fixed-row-width hash table in a memory-mapped file. Every
//! process mapping the same file sees the same rows without any copy or
//! serialization round-trip.
//!
//! Rows are addressed by open addressing, stepping one row at a time from
//! the hashed slot. Each row has its own spin lock, so gets, updates and
//! deletes of different keys never contend. Turning a free row into a live
//! one also takes the table's insert lock, which keeps two processes from
//! inserting one key into two slots.
//! A process that dies while holding a lock leaves that lock held.
//!
//! No lookup chain ever crosses an empty row. A removed row becomes a
//! tombstone, and tombstones turn back into empty rows, under the insert
//! lock, as soon as that invariant allows it.

mod layout;
mod row;

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{fence, Ordering};
use std::thread;
use std::time::Duration;

use memmap2::MmapRaw;
use thiserror::Error;
use tracing::{debug, info};

pub use layout::TableLayout;

use crate::cache::{is_expired, slot_hash};
use layout::{
    HEADER_CAPACITY, HEADER_INSERT_LOCK, HEADER_KEY_WIDTH, HEADER_SIZE, HEADER_VALUE_WIDTH,
    HEADER_VERSION, MAGIC, STATE_EMPTY, STATE_LIVE, STATE_TOMBSTONE, VERSION,
};
use row::{Row, SpinGuard};

/// Attempts made while another process finishes formatting a new table.
const ATTACH_RETRIES: u32 = 200;
const ATTACH_BACKOFF: Duration = Duration::from_millis(5);

// == Table Error ==
/// Why a row could not be written.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("key of {len} bytes exceeds the {max} byte key column")]
    KeyTooLong { len: usize, max: usize },

    #[error("value of {len} bytes exceeds the {max} byte value column")]
    ValueTooLong { len: usize, max: usize },

    #[error("table is full")]
    Full,
}

/// A live row copied out of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Absolute expiry, 0 for none
    pub expire_at: i64,
    /// Unix second of the last write
    pub written_at: i64,
    pub value: Vec<u8>,
}

// == Shared Table ==
pub struct SharedTable {
    path: PathBuf,
    layout: TableLayout,
    map: MmapRaw,
}

impl fmt::Debug for SharedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTable")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .finish()
    }
}

impl SharedTable {
    /// Creates and formats the table file, or attaches to it if it already
    /// exists. Returns `true` alongside the table when this call created it.
    ///
    /// Attaching validates that the existing table has the same layout.
    pub fn open_or_create(
        path: impl Into<PathBuf>,
        layout: TableLayout,
    ) -> io::Result<(Self, bool)> {
        let path = path.into();
        layout.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => {
                file.set_len(layout.file_len())?;
                let map = MmapRaw::map_raw(&file)?;
                let table = Self { path, layout, map };
                table.write_header();
                info!(path = %table.path.display(), ?layout, "shared table created");
                Ok((table, true))
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let table = Self::attach(path, layout)?;
                Ok((table, false))
            }
            Err(err) => Err(err),
        }
    }

    fn attach(path: PathBuf, layout: TableLayout) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        for _ in 0..ATTACH_RETRIES {
            if file.metadata()?.len() == layout.file_len() {
                let map = MmapRaw::map_raw(&file)?;
                let table = Self { path: path.clone(), layout, map };
                if table.has_magic() {
                    table.check_header()?;
                    debug!(path = %table.path.display(), "attached to shared table");
                    return Ok(table);
                }
            }
            // The creating process has not finished formatting yet
            thread::sleep(ATTACH_BACKOFF);
        }

        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{} is not a shared table with layout {layout:?}",
                path.display()
            ),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> TableLayout {
        self.layout
    }

    // == Header ==
    fn header_ptr(&self, offset: usize) -> *mut u8 {
        // SAFETY: the mapping is at least HEADER_SIZE bytes long.
        unsafe { self.map.as_mut_ptr().add(offset) }
    }

    fn read_header_u32(&self, offset: usize) -> u32 {
        // SAFETY: header offsets are within HEADER_SIZE.
        unsafe { ptr::read_unaligned(self.header_ptr(offset) as *const u32) }
    }

    fn write_header(&self) {
        let fields = [
            (HEADER_VERSION, VERSION),
            (HEADER_CAPACITY, self.layout.capacity),
            (HEADER_KEY_WIDTH, self.layout.key_width),
            (HEADER_VALUE_WIDTH, self.layout.value_width),
        ];
        // SAFETY: header offsets are within HEADER_SIZE; nobody attaches
        // before the magic is published.
        unsafe {
            for (offset, value) in fields {
                ptr::write_unaligned(self.header_ptr(offset) as *mut u32, value);
            }
            fence(Ordering::Release);
            ptr::copy_nonoverlapping(MAGIC.as_ptr(), self.header_ptr(0), MAGIC.len());
        }
    }

    fn has_magic(&self) -> bool {
        let mut magic = [0u8; 8];
        // SAFETY: the first 8 header bytes hold the magic.
        unsafe { ptr::copy_nonoverlapping(self.header_ptr(0), magic.as_mut_ptr(), magic.len()) };
        fence(Ordering::Acquire);
        magic == MAGIC
    }

    fn check_header(&self) -> io::Result<()> {
        let found = TableLayout::new(
            self.read_header_u32(HEADER_CAPACITY),
            self.read_header_u32(HEADER_KEY_WIDTH),
            self.read_header_u32(HEADER_VALUE_WIDTH),
        );
        let version = self.read_header_u32(HEADER_VERSION);
        if version != VERSION || found != self.layout {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "shared table {} has version {version} layout {found:?}, expected {:?}",
                    self.path.display(),
                    self.layout
                ),
            ));
        }
        Ok(())
    }

    // == Rows ==
    fn row(&self, index: usize) -> Row<'_> {
        debug_assert!(index < self.layout.capacity as usize);
        let offset = HEADER_SIZE + index * self.layout.row_size();
        // SAFETY: offset is the aligned start of a row inside the mapping,
        // and the mapping lives as long as &self.
        unsafe { Row::lock(self.map.as_mut_ptr().add(offset), self.layout) }
    }

    fn lock_inserts(&self) -> SpinGuard<'_> {
        // SAFETY: the insert lock is an aligned word inside the header.
        unsafe { SpinGuard::acquire(self.header_ptr(HEADER_INSERT_LOCK)) }
    }

    fn chain(&self, key: &[u8]) -> impl Iterator<Item = usize> {
        let capacity = self.layout.capacity as usize;
        let start = (slot_hash(key) % capacity as u64) as usize;
        (0..capacity).map(move |step| (start + step) % capacity)
    }

    /// Locked live row holding `key`, with its index.
    fn find(&self, key: &[u8]) -> Option<(usize, Row<'_>)> {
        for index in self.chain(key) {
            let row = self.row(index);
            match row.state() {
                STATE_EMPTY => return None,
                STATE_LIVE if row.key() == key => return Some((index, row)),
                _ => {}
            }
        }
        None
    }

    /// Tombstones a live row, then reclaims it if no lookup chain runs past it.
    fn remove(&self, index: usize, mut row: Row<'_>) {
        row.set_state(STATE_TOMBSTONE);
        // Never wait for the insert lock while holding a row lock
        drop(row);

        let _inserting = self.lock_inserts();
        self.reclaim_from(index);
    }

    /// Empties the tombstone at `index` and the run of tombstones just before
    /// it, provided the row after `index` is empty. Returns the number of
    /// rows reclaimed. Caller holds the insert lock, so no empty row can turn
    /// live meanwhile.
    fn reclaim_from(&self, index: usize) -> usize {
        let capacity = self.layout.capacity as usize;
        if self.row((index + 1) % capacity).state() != STATE_EMPTY {
            return 0;
        }

        let mut reclaimed = 0;
        let mut current = index;
        while reclaimed < capacity {
            let mut row = self.row(current);
            if row.state() != STATE_TOMBSTONE {
                break;
            }
            row.set_state(STATE_EMPTY);
            reclaimed += 1;
            current = (current + capacity - 1) % capacity;
        }
        reclaimed
    }

    /// Reclaims every tombstone no lookup chain depends on. With no live row
    /// left, that is all of them.
    fn compact(&self) -> usize {
        let _inserting = self.lock_inserts();
        let capacity = self.layout.capacity as usize;

        // Live rows only appear under the insert lock, so none can show up
        // between this count and the reset below.
        if self.len() == 0 {
            let mut reclaimed = 0;
            for index in 0..capacity {
                let mut row = self.row(index);
                if row.state() == STATE_TOMBSTONE {
                    row.set_state(STATE_EMPTY);
                    reclaimed += 1;
                }
            }
            return reclaimed;
        }

        let mut reclaimed = 0;
        for index in 0..capacity {
            if self.row(index).state() == STATE_TOMBSTONE {
                reclaimed += self.reclaim_from(index);
            }
        }
        reclaimed
    }

    // == Operations ==
    /// Reads a live row. A row already expired at `now` is removed and
    /// reported as absent.
    pub fn get(&self, key: &[u8], now: i64) -> Option<TableRow> {
        let (index, row) = self.find(key)?;
        if is_expired(row.expire_at(), now) {
            self.remove(index, row);
            return None;
        }
        Some(TableRow {
            expire_at: row.expire_at(),
            written_at: row.written_at(),
            value: row.value().to_vec(),
        })
    }

    /// Presence check with the same lazy expiry as [`SharedTable::get`].
    pub fn exists(&self, key: &[u8], now: i64) -> bool {
        let Some((index, row)) = self.find(key) else {
            return false;
        };
        if is_expired(row.expire_at(), now) {
            self.remove(index, row);
            return false;
        }
        true
    }

    /// Inserts or overwrites a row written at `written_at`. Oversized keys
    /// and values are rejected, never truncated.
    pub fn set(
        &self,
        key: &[u8],
        expire_at: i64,
        written_at: i64,
        value: &[u8],
    ) -> Result<(), TableError> {
        let max_key = self.layout.key_width as usize;
        if key.len() > max_key {
            return Err(TableError::KeyTooLong {
                len: key.len(),
                max: max_key,
            });
        }
        let max_value = self.layout.value_width as usize;
        if value.len() > max_value {
            return Err(TableError::ValueTooLong {
                len: value.len(),
                max: max_value,
            });
        }

        if let Some((_, mut row)) = self.find(key) {
            row.fill(key, expire_at, written_at, value);
            return Ok(());
        }

        // Only inserters make a free row live, so a free slot found under
        // the insert lock stays free until we fill it.
        let _inserting = self.lock_inserts();
        let mut free = None;
        for index in self.chain(key) {
            let mut row = self.row(index);
            match row.state() {
                STATE_LIVE if row.key() == key => {
                    row.fill(key, expire_at, written_at, value);
                    return Ok(());
                }
                STATE_LIVE => {}
                STATE_EMPTY => {
                    free.get_or_insert(index);
                    break;
                }
                _ => {
                    free.get_or_insert(index);
                }
            }
        }

        let index = free.ok_or(TableError::Full)?;
        self.row(index).fill(key, expire_at, written_at, value);
        Ok(())
    }

    /// Removes a live row; `false` if the key is absent.
    pub fn delete(&self, key: &[u8]) -> bool {
        match self.find(key) {
            Some((index, row)) => {
                self.remove(index, row);
                true
            }
            None => false,
        }
    }

    /// Removes every live row for which `keep(key, expire_at, written_at)`
    /// returns false, one row at a time, then reclaims tombstones left by
    /// this and earlier removals. Returns the number of rows removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&[u8], i64, i64) -> bool,
    {
        let mut removed = 0;
        for index in 0..self.layout.capacity as usize {
            let mut row = self.row(index);
            if row.state() == STATE_LIVE && !keep(row.key(), row.expire_at(), row.written_at()) {
                row.set_state(STATE_TOMBSTONE);
                removed += 1;
            }
        }

        let reclaimed = self.compact();
        debug!(removed, reclaimed, "table rows released");
        removed
    }

    /// Copies out every live row with its key.
    pub fn rows(&self) -> Vec<(Vec<u8>, TableRow)> {
        (0..self.layout.capacity as usize)
            .filter_map(|index| {
                let row = self.row(index);
                (row.state() == STATE_LIVE).then(|| {
                    (
                        row.key().to_vec(),
                        TableRow {
                            expire_at: row.expire_at(),
                            written_at: row.written_at(),
                            value: row.value().to_vec(),
                        },
                    )
                })
            })
            .collect()
    }

    /// Number of live rows, expired-but-unread ones included.
    pub fn len(&self) -> usize {
        (0..self.layout.capacity as usize)
            .filter(|&index| self.row(index).state() == STATE_LIVE)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
