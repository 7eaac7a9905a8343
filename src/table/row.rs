//! Locked views over rows of the mapped table.

use std::hint;
use std::marker::PhantomData;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU32, Ordering};

use super::layout::{
    TableLayout, ROW_EXPIRE_AT, ROW_KEY, ROW_KEY_LEN, ROW_LOCK, ROW_STATE, ROW_VALUE_LEN,
    ROW_WRITTEN_AT, STATE_LIVE,
};

// == Spin Lock ==
/// Guard for a lock word living in shared memory. Released on drop.
pub(crate) struct SpinGuard<'a> {
    lock: &'a AtomicU32,
}

impl<'a> SpinGuard<'a> {
    /// Spins until the lock word at `ptr` is acquired.
    ///
    /// # Safety
    /// `ptr` must be 4-byte aligned and point into a mapping that outlives `'a`.
    pub(crate) unsafe fn acquire(ptr: *mut u8) -> Self {
        // SAFETY: guaranteed by the caller; AtomicU32 has the layout of u32.
        let lock = unsafe { &*(ptr as *const AtomicU32) };
        while lock
            .compare_exchange_weak(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while lock.load(Ordering::Relaxed) != 0 {
                hint::spin_loop();
            }
        }
        Self { lock }
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.store(0, Ordering::Release);
    }
}

// == Row ==
/// A row whose lock is held for the lifetime of the value.
pub(crate) struct Row<'a> {
    ptr: *mut u8,
    layout: TableLayout,
    _guard: SpinGuard<'a>,
    _table: PhantomData<&'a ()>,
}

impl<'a> Row<'a> {
    /// Locks the row starting at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be the 8-byte aligned start of a row of `layout` inside a
    /// mapping that outlives `'a`.
    pub(crate) unsafe fn lock(ptr: *mut u8, layout: TableLayout) -> Self {
        // SAFETY: the row lock is an aligned word at the start of the row.
        let guard = unsafe { SpinGuard::acquire(ptr.add(ROW_LOCK)) };
        Self {
            ptr,
            layout,
            _guard: guard,
            _table: PhantomData,
        }
    }

    fn read_u32(&self, offset: usize) -> u32 {
        // SAFETY: offsets come from the layout and stay inside the row.
        unsafe { ptr::read_unaligned(self.ptr.add(offset) as *const u32) }
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        // SAFETY: see read_u32; the row lock gives exclusive access.
        unsafe { ptr::write_unaligned(self.ptr.add(offset) as *mut u32, value) }
    }

    pub(crate) fn state(&self) -> u32 {
        self.read_u32(ROW_STATE)
    }

    pub(crate) fn set_state(&mut self, state: u32) {
        self.write_u32(ROW_STATE, state);
    }

    fn read_i64(&self, offset: usize) -> i64 {
        // SAFETY: see read_u32.
        unsafe { ptr::read_unaligned(self.ptr.add(offset) as *const i64) }
    }

    pub(crate) fn expire_at(&self) -> i64 {
        self.read_i64(ROW_EXPIRE_AT)
    }

    pub(crate) fn written_at(&self) -> i64 {
        self.read_i64(ROW_WRITTEN_AT)
    }

    pub(crate) fn key(&self) -> &[u8] {
        let len = (self.read_u32(ROW_KEY_LEN) as usize).min(self.layout.key_width as usize);
        // SAFETY: the key region is key_width bytes long and len is clamped to it.
        unsafe { slice::from_raw_parts(self.ptr.add(ROW_KEY), len) }
    }

    pub(crate) fn value(&self) -> &[u8] {
        let len = (self.read_u32(ROW_VALUE_LEN) as usize).min(self.layout.value_width as usize);
        // SAFETY: the value region is value_width bytes long and len is clamped to it.
        unsafe { slice::from_raw_parts(self.ptr.add(self.layout.value_offset()), len) }
    }

    /// Stores key, payload and both timestamps and marks the row live.
    /// Callers have already checked both lengths against the layout.
    pub(crate) fn fill(&mut self, key: &[u8], expire_at: i64, written_at: i64, value: &[u8]) {
        debug_assert!(key.len() <= self.layout.key_width as usize);
        debug_assert!(value.len() <= self.layout.value_width as usize);

        // SAFETY: lengths are within the row's key and value regions.
        unsafe {
            ptr::copy_nonoverlapping(key.as_ptr(), self.ptr.add(ROW_KEY), key.len());
            ptr::copy_nonoverlapping(
                value.as_ptr(),
                self.ptr.add(self.layout.value_offset()),
                value.len(),
            );
            ptr::write_unaligned(self.ptr.add(ROW_EXPIRE_AT) as *mut i64, expire_at);
            ptr::write_unaligned(self.ptr.add(ROW_WRITTEN_AT) as *mut i64, written_at);
        }
        self.write_u32(ROW_KEY_LEN, key.len() as u32);
        self.write_u32(ROW_VALUE_LEN, value.len() as u32);
        self.set_state(STATE_LIVE);
    }
}
