//! Single-producer / multiple-consumer circular buffer.
//!
//! A [`SlotRing`] is a fixed ring of typed slots. The producer thread takes
//! exclusive write access to one slot at a time; consumer threads take
//! shared read access to filled slots. Consume handles drain their slot on
//! release, peek handles leave it in place, and every acquisition is bounded
//! by the ring's lock timeout.
//!
//! ```
//! use spmcbuf::SlotRing;
//!
//! let ring = SlotRing::<u64>::new(10)?;
//!
//! // Producer: fill the next slot. The handle releases the slot on drop,
//! // which is when it becomes visible to consumers.
//! {
//!     let mut wa = ring.write_next()?;
//!     *wa = 42;
//!     if wa.overwritten() {
//!         // The slot still held data no consumer ever drained.
//!     }
//! }
//!
//! // Consumer: take the oldest filled slot; dropping the handle drains it.
//! {
//!     let ca = ring.consume_next_available()?;
//!     assert_eq!(*ca, 42);
//! }
//! # Ok::<(), spmcbuf::SpmcBufError>(())
//! ```
//!
//! The contract is a single producer thread; readers and consumers may be
//! arbitrarily many. A producer that laps an undrained slot overwrites it —
//! the ring favours freshness over lossless delivery.

pub mod access;
pub mod error;
pub mod ring;

mod slot;
mod trace_macro;

// Public API - these are what users should use
pub use access::{ConsumeSlot, ReadSlot, WriteSlot};
pub use error::SpmcBufError;
pub use ring::{SlotRing, DEFAULT_LOCK_TIMEOUT};
