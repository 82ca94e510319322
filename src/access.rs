//! Scoped access handles.
//!
//! Each handle owns its slot's lock for as long as it lives and dereferences
//! to the slot's value. Dropping a handle is what moves the slot through its
//! state machine: a released write makes the slot consumable, a released
//! consume drains it, a released peek leaves it untouched.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::ring::SlotRing;

/// Exclusive write access to one slot, granted by
/// [`SlotRing::write_next`].
///
/// On release the slot is marked consumable and appended to the ring's
/// queue, unless a previous fill of the same slot is still queued.
pub struct WriteSlot<'a, T> {
    ring: &'a SlotRing<T>,
    index: usize,
    overwrote: bool,
    guard: RwLockWriteGuard<'a, T>,
}

impl<'a, T> WriteSlot<'a, T> {
    pub(crate) fn new(
        ring: &'a SlotRing<T>,
        index: usize,
        overwrote: bool,
        guard: RwLockWriteGuard<'a, T>,
    ) -> Self {
        WriteSlot {
            ring,
            index,
            overwrote,
            guard,
        }
    }

    /// Index of the slot this handle governs.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// True if the slot still held undrained data when this write was
    /// granted.
    #[inline]
    pub fn overwritten(&self) -> bool {
        self.overwrote
    }
}

impl<T> Deref for WriteSlot<'_, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for WriteSlot<'_, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for WriteSlot<'_, T> {
    fn drop(&mut self) {
        let slot = &self.ring.slots[self.index];

        let mut consumable = self.ring.consumable.lock();
        slot.set_writing(false);
        if !slot.set_dirty(true) {
            // Already-queued slots are not appended twice; the fresh value
            // is delivered through the existing entry.
            consumable.push_back(self.index);
            self.ring.n_consumable.fetch_add(1, Ordering::Release);
        }
        self.ring.data_available.notify_one();
        drop(consumable);

        crate::spmc_trace!(index = self.index, "write access released");
        // The exclusive slot lock is released when `guard` drops.
    }
}

/// Shared read access to one slot, granted by [`SlotRing::read_slot`] or
/// [`SlotRing::read_newest_available`]. Release never alters the slot's
/// drained state.
pub struct ReadSlot<'a, T> {
    ring: &'a SlotRing<T>,
    index: usize,
    guard: RwLockReadGuard<'a, T>,
}

impl<'a, T> ReadSlot<'a, T> {
    pub(crate) fn new(
        ring: &'a SlotRing<T>,
        index: usize,
        guard: RwLockReadGuard<'a, T>,
    ) -> Self {
        ReadSlot { ring, index, guard }
    }

    /// Index of the slot this handle governs.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Deref for ReadSlot<'_, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Drop for ReadSlot<'_, T> {
    fn drop(&mut self) {
        self.ring.slots[self.index].remove_reader();
        crate::spmc_trace!(index = self.index, "read access released");
    }
}

/// Shared read access that drains its slot on release, granted by
/// [`SlotRing::consume_next_available`]. The queue entry was already
/// removed when the handle was granted.
pub struct ConsumeSlot<'a, T> {
    ring: &'a SlotRing<T>,
    index: usize,
    guard: RwLockReadGuard<'a, T>,
}

impl<'a, T> ConsumeSlot<'a, T> {
    pub(crate) fn new(
        ring: &'a SlotRing<T>,
        index: usize,
        guard: RwLockReadGuard<'a, T>,
    ) -> Self {
        ConsumeSlot { ring, index, guard }
    }

    /// Index of the slot this handle governs.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Deref for ConsumeSlot<'_, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Drop for ConsumeSlot<'_, T> {
    fn drop(&mut self) {
        let slot = &self.ring.slots[self.index];
        slot.set_dirty(false);
        slot.remove_reader();
        crate::spmc_trace!(index = self.index, "consume access released");
    }
}

#[cfg(test)]
mod tests {
    use crate::ring::SlotRing;

    #[test]
    fn test_write_deref_roundtrip() {
        let ring = SlotRing::<String>::new(2).unwrap();
        {
            let mut wa = ring.write_next().unwrap();
            wa.push_str("hello");
        }
        let ca = ring.consume_next_available().unwrap();
        assert_eq!(&*ca, "hello");
    }

    #[test]
    fn test_consume_release_drains_slot() {
        let ring = SlotRing::<i32>::new(2).unwrap();
        drop(ring.write_next().unwrap());

        let ca = ring.consume_next_available().unwrap();
        assert!(ring.is_dirty(0));
        assert_eq!(ring.num_concurrent_read(0), 1);

        drop(ca);
        assert!(!ring.is_dirty(0));
        assert_eq!(ring.num_concurrent_read(0), 0);
    }

    #[test]
    fn test_peek_release_leaves_slot_consumable() {
        let ring = SlotRing::<i32>::new(2).unwrap();
        drop(ring.write_next().unwrap());

        let ra = ring.read_newest_available().unwrap();
        assert_eq!(ring.num_consumable_slots(), 1);
        drop(ra);

        assert!(ring.is_dirty(0));
        assert_eq!(ring.num_consumable_slots(), 1);
    }

    #[test]
    fn test_default_initialised_cells() {
        let ring = SlotRing::<u64>::new(3).unwrap();
        let ra = ring.read_slot(1).unwrap();
        assert_eq!(*ra, 0);
    }
}
