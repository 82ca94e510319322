use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use crate::access::{ConsumeSlot, ReadSlot, WriteSlot};
use crate::error::SpmcBufError;
use crate::slot::Slot;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Fixed-capacity ring of typed slots for single-producer /
/// multiple-consumer pipelines.
///
/// The producer cycles over the slots with [`write_next`](Self::write_next);
/// each released write makes the slot consumable. Consumers drain slots in
/// production order with
/// [`consume_next_available`](Self::consume_next_available), while peek
/// readers observe slots without draining them. Every acquisition is bounded
/// by the ring's lock timeout.
///
/// The contract is one producer thread; readers and consumers may be
/// arbitrarily many and run concurrently with the producer.
pub struct SlotRing<T> {
    pub(crate) slots: Box<[CachePadded<Slot<T>>]>,
    /// Write cursor, behind the coarse lock serialising cursor advances,
    /// `clear` and the diagnostic snapshot.
    cursor: Mutex<usize>,
    /// Indices of filled-but-undrained slots, oldest at the front. Append
    /// and pop happen under this mutex; `data_available` is its condvar.
    /// The mutex is only ever held for short structural sections (and
    /// condvar waits, which release it) — never across a slot lock attempt,
    /// so a producer releasing its handle cannot stall behind a consumer.
    pub(crate) consumable: Mutex<VecDeque<usize>>,
    pub(crate) data_available: Condvar,
    /// Racy mirror of the queue length for the advisory observer.
    pub(crate) n_consumable: AtomicUsize,
    lock_timeout: Duration,
}

impl<T: Default> SlotRing<T> {
    /// Create a ring of `capacity` default-initialised slots with the
    /// default one-second lock timeout.
    pub fn new(capacity: usize) -> Result<Self, SpmcBufError> {
        Self::with_lock_timeout(capacity, DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a ring with an explicit deadline for every blocking
    /// acquisition (slot locks, the cursor lock, and availability waits).
    pub fn with_lock_timeout(
        capacity: usize,
        lock_timeout: Duration,
    ) -> Result<Self, SpmcBufError> {
        if capacity == 0 {
            return Err(SpmcBufError::ZeroCapacity);
        }

        let slots = (0..capacity)
            .map(|_| CachePadded::new(Slot::new(T::default())))
            .collect();

        Ok(SlotRing {
            slots,
            cursor: Mutex::new(0),
            consumable: Mutex::new(VecDeque::with_capacity(capacity)),
            data_available: Condvar::new(),
            n_consumable: AtomicUsize::new(0),
            lock_timeout,
        })
    }
}

impl<T> SlotRing<T> {
    /// Gain exclusive write access to the slot under the write cursor and
    /// advance the cursor.
    ///
    /// The returned handle dereferences to the slot's value; releasing it
    /// marks the slot consumable. [`WriteSlot::overwritten`] reports whether
    /// the slot still held undrained data when the write was granted.
    pub fn write_next(&self) -> Result<WriteSlot<'_, T>, SpmcBufError> {
        // Cursor snapshot, slot acquisition and advance form one critical
        // section, so the lock order is always cursor-then-slot.
        let mut cursor = self
            .cursor
            .try_lock_for(self.lock_timeout)
            .ok_or(SpmcBufError::SlotAcqTimeout)?;
        let index = *cursor;

        let slot = &self.slots[index];
        let guard = slot
            .cell
            .try_write_for(self.lock_timeout)
            .ok_or(SpmcBufError::SlotAcqTimeout)?;

        let overwrote = slot.dirty();
        slot.set_writing(true);
        *cursor = (index + 1) % self.slots.len();

        crate::spmc_trace!(index = index, overwrote = overwrote, "write access granted");

        Ok(WriteSlot::new(self, index, overwrote, guard))
    }

    /// Gain shared read access to slot `index` without affecting its
    /// drained state.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`capacity`](Self::capacity).
    pub fn read_slot(&self, index: usize) -> Result<ReadSlot<'_, T>, SpmcBufError> {
        assert!(
            index < self.slots.len(),
            "slot index {index} out of range for ring of {} slots",
            self.slots.len()
        );

        let slot = &self.slots[index];
        let guard = slot
            .cell
            .try_read_for(self.lock_timeout)
            .ok_or(SpmcBufError::SlotAcqTimeout)?;
        slot.add_reader();

        crate::spmc_trace!(index = index, "read access granted");

        Ok(ReadSlot::new(self, index, guard))
    }

    /// Gain shared read access to the most recently filled slot, waiting up
    /// to the lock timeout for one to appear. The deadline covers the whole
    /// operation, availability wait and slot lock together.
    ///
    /// The slot stays consumable: peek readers never drain, and several may
    /// observe the same slot at once.
    pub fn read_newest_available(&self) -> Result<ReadSlot<'_, T>, SpmcBufError> {
        let deadline = Instant::now() + self.lock_timeout;

        // The queue mutex is released before the slot lock attempt, so
        // handle releases elsewhere are never stuck behind this wait.
        let index = {
            let mut consumable = self.consumable.lock();
            loop {
                if let Some(&index) = consumable.back() {
                    break index;
                }
                if self
                    .data_available
                    .wait_until(&mut consumable, deadline)
                    .timed_out()
                {
                    return Err(SpmcBufError::DataAvailableTimeout);
                }
            }
        };

        let slot = &self.slots[index];
        let guard = slot
            .cell
            .try_read_until(deadline)
            .ok_or(SpmcBufError::SlotAcqTimeout)?;
        slot.add_reader();

        crate::spmc_trace!(index = index, "newest read access granted");

        Ok(ReadSlot::new(self, index, guard))
    }

    /// Gain shared read access to the least recently filled slot and remove
    /// it from the consumable queue; releasing the handle drains the slot.
    ///
    /// Waits up to the lock timeout for data; the deadline covers the whole
    /// operation, availability wait and slot lock together. Delivery order
    /// matches production order.
    pub fn consume_next_available(&self) -> Result<ConsumeSlot<'_, T>, SpmcBufError> {
        let deadline = Instant::now() + self.lock_timeout;

        loop {
            // The queue mutex is released before the slot lock attempt, so
            // handle releases elsewhere are never stuck behind this wait.
            let index = {
                let mut consumable = self.consumable.lock();
                loop {
                    if let Some(&index) = consumable.front() {
                        break index;
                    }
                    if self
                        .data_available
                        .wait_until(&mut consumable, deadline)
                        .timed_out()
                    {
                        return Err(SpmcBufError::DataAvailableTimeout);
                    }
                }
            };

            let slot = &self.slots[index];
            let guard = match slot.cell.try_read_until(deadline) {
                Some(guard) => guard,
                None => {
                    // We could not lock this slot; another waiter may succeed.
                    self.data_available.notify_all();
                    return Err(SpmcBufError::SlotAcqTimeout);
                }
            };

            let mut consumable = self.consumable.lock();
            if consumable.front() == Some(&index) {
                consumable.pop_front();
                self.n_consumable.fetch_sub(1, Ordering::Release);
                drop(consumable);
                slot.add_reader();

                crate::spmc_trace!(index = index, "consume access granted");

                return Ok(ConsumeSlot::new(self, index, guard));
            }
            // Another consumer took this entry while we locked the slot;
            // go back and wait for the next one.
        }
    }

    /// Discard all consumable slots and reset the write cursor to slot 0.
    ///
    /// Intended to be called while no other thread is accessing the ring;
    /// live access handles and `clear` must not overlap.
    pub fn clear(&self) -> Result<(), SpmcBufError> {
        let mut cursor = self
            .cursor
            .try_lock_for(self.lock_timeout)
            .ok_or(SpmcBufError::SlotAcqTimeout)?;

        let mut consumable = self.consumable.lock();
        consumable.clear();
        self.n_consumable.store(0, Ordering::Release);
        // Stale dirty flags would suppress the next append for their slot.
        for slot in self.slots.iter() {
            slot.set_dirty(false);
        }
        *cursor = 0;

        Ok(())
    }

    /// Number of slots in the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Deadline applied to every blocking acquisition.
    #[inline]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// True if an unreleased write handle references `index`. Out-of-range
    /// indices report false.
    #[inline]
    pub fn is_written(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.is_writing())
    }

    /// Number of live read/consume handles on `index`. Out-of-range indices
    /// report zero.
    #[inline]
    pub fn num_concurrent_read(&self, index: usize) -> usize {
        self.slots.get(index).map_or(0, |slot| slot.readers())
    }

    /// True if at least one read/consume handle references `index`.
    #[inline]
    pub fn is_read(&self, index: usize) -> bool {
        self.num_concurrent_read(index) > 0
    }

    /// True if `index` holds data that was produced and not yet drained.
    /// Out-of-range indices report false.
    #[inline]
    pub fn is_dirty(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.dirty())
    }

    /// Number of filled-but-undrained slots queued for consumption. Like
    /// the other observers this reads racily and never blocks.
    #[inline]
    pub fn num_consumable_slots(&self) -> usize {
        self.n_consumable.load(Ordering::Acquire)
    }
}

/// Single-line snapshot of the ring: one field per slot, in index order.
/// `W` marks a slot being written, `kR` a slot with `k` live readers, `X` a
/// consumable slot, `.` an idle one.
impl<T> fmt::Display for SlotRing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _cursor = self.cursor.lock();

        f.write_str("[ ")?;
        for slot in self.slots.iter() {
            let readers = slot.readers();
            if slot.is_writing() {
                f.write_str(" W ")?;
            } else if readers > 0 {
                write!(f, "{readers}R ")?;
            } else if slot.dirty() {
                f.write_str(" X ")?;
            } else {
                f.write_str(" . ")?;
            }
        }
        f.write_str(" ]")
    }
}
