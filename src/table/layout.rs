//! On-disk layout of a shared table file.
//!
//! ```text
//! header (64 bytes)
//!   0..8    magic "CACHETBL"
//!   8..12   version
//!   12..16  capacity
//!   16..20  key width
//!   20..24  value width
//!   24..28  insert lock
//! rows (capacity x row_size, row_size a multiple of 8)
//!   0..4    row lock
//!   4..8    state (empty / live / tombstone)
//!   8..16   expire_at
//!   16..24  written_at
//!   24..28  key length
//!   28..32  value length
//!   32..    key bytes, then value bytes
//! ```

use std::io;

pub(crate) const MAGIC: [u8; 8] = *b"CACHETBL";
pub(crate) const VERSION: u32 = 2;
pub(crate) const HEADER_SIZE: usize = 64;

pub(crate) const HEADER_VERSION: usize = 8;
pub(crate) const HEADER_CAPACITY: usize = 12;
pub(crate) const HEADER_KEY_WIDTH: usize = 16;
pub(crate) const HEADER_VALUE_WIDTH: usize = 20;
pub(crate) const HEADER_INSERT_LOCK: usize = 24;

pub(crate) const ROW_LOCK: usize = 0;
pub(crate) const ROW_STATE: usize = 4;
pub(crate) const ROW_EXPIRE_AT: usize = 8;
pub(crate) const ROW_WRITTEN_AT: usize = 16;
pub(crate) const ROW_KEY_LEN: usize = 24;
pub(crate) const ROW_VALUE_LEN: usize = 28;
pub(crate) const ROW_KEY: usize = 32;

pub(crate) const STATE_EMPTY: u32 = 0;
pub(crate) const STATE_LIVE: u32 = 1;
pub(crate) const STATE_TOMBSTONE: u32 = 2;

/// Fixed dimensions of a table. Every process attaching to the same table
/// must use the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    /// Number of rows
    pub capacity: u32,
    /// Maximum key length in bytes
    pub key_width: u32,
    /// Maximum payload length in bytes
    pub value_width: u32,
}

impl TableLayout {
    pub fn new(capacity: u32, key_width: u32, value_width: u32) -> Self {
        Self {
            capacity,
            key_width,
            value_width,
        }
    }

    pub(crate) fn validate(&self) -> io::Result<()> {
        if self.capacity == 0 || self.key_width == 0 || self.value_width == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("table dimensions must be non-zero: {self:?}"),
            ));
        }
        Ok(())
    }

    pub(crate) fn row_size(&self) -> usize {
        let raw = ROW_KEY + self.key_width as usize + self.value_width as usize;
        raw.div_ceil(8) * 8
    }

    pub(crate) fn value_offset(&self) -> usize {
        ROW_KEY + self.key_width as usize
    }

    pub(crate) fn file_len(&self) -> u64 {
        (HEADER_SIZE + self.capacity as usize * self.row_size()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_size_is_aligned() {
        let layout = TableLayout::new(4, 5, 7);
        assert_eq!(layout.row_size(), 48);
        assert_eq!(layout.value_offset(), 37);
        assert_eq!(layout.file_len(), 64 + 4 * 48);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(TableLayout::new(0, 8, 8).validate().is_err());
        assert!(TableLayout::new(8, 0, 8).validate().is_err());
        assert!(TableLayout::new(8, 8, 0).validate().is_err());
        assert!(TableLayout::new(8, 8, 8).validate().is_ok());
    }
}
