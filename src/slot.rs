//! Per-slot storage cell and advisory descriptor.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// One ring slot: the value cell behind its reader/writer lock, plus the
/// advisory flags rendered by the diagnostic snapshot.
///
/// The flags are only ever mutated by the holder of `cell`'s lock in the
/// matching mode (`writing` and `is_dirty` by the writer, `n_reading` by
/// readers); observers load them racily.
pub(crate) struct Slot<T> {
    pub(crate) cell: RwLock<T>,
    writing: AtomicBool,
    n_reading: AtomicUsize,
    is_dirty: AtomicBool,
}

impl<T> Slot<T> {
    pub(crate) fn new(value: T) -> Self {
        Slot {
            cell: RwLock::new(value),
            writing: AtomicBool::new(false),
            n_reading: AtomicUsize::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    #[inline(always)]
    pub(crate) fn is_writing(&self) -> bool {
        self.writing.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn set_writing(&self, on: bool) {
        self.writing.store(on, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn readers(&self) -> usize {
        self.n_reading.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn add_reader(&self) {
        self.n_reading.fetch_add(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub(crate) fn remove_reader(&self) {
        self.n_reading.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub(crate) fn dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Returns the previous dirtiness.
    #[inline(always)]
    pub(crate) fn set_dirty(&self, on: bool) -> bool {
        self.is_dirty.swap(on, Ordering::AcqRel)
    }
}
