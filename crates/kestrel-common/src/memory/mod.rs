//! Memory accounting for operator output.
//!
//! Operators do not allocate through this module; they charge the bytes
//! they are about to hold against a shared, bounded [`BufferAllocator`] and
//! keep the returned [`Reservation`] alive for as long as they hold them.

mod allocator;

pub use allocator::{AllocatorStats, BufferAllocator, Reservation};
