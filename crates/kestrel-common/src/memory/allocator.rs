//! Bounded byte-accounting allocator.
//!
//! # Design
//!
//! - One allocator per fragment, shared through `Arc`
//! - Reservations never over-commit: a request that does not fit fails whole
//! - Reservations release their bytes when dropped

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{KestrelError, KestrelResult};

#[derive(Debug, Default)]
struct AllocatorState {
    allocated: usize,
    peak: usize,
    failures: u64,
}

/// A bounded allocator that tracks bytes held by operators.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kestrel_common::memory::BufferAllocator;
///
/// let allocator = Arc::new(BufferAllocator::new(1024));
/// let mut reservation = allocator.reserve(512).unwrap();
/// assert_eq!(allocator.available(), 512);
///
/// assert!(allocator.reserve(1024).is_err());
///
/// reservation.free();
/// assert_eq!(allocator.allocated(), 0);
/// ```
pub struct BufferAllocator {
    limit: usize,
    state: Mutex<AllocatorState>,
}

impl BufferAllocator {
    /// Creates an allocator with the given byte limit.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Mutex::new(AllocatorState::default()),
        }
    }

    /// Returns the byte limit.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of bytes currently reserved.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.state.lock().allocated
    }

    /// Returns the number of bytes still available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.state.lock().allocated)
    }

    /// Reserves `bytes` and returns a guard that releases them on drop.
    pub fn reserve(self: &Arc<Self>, bytes: usize) -> KestrelResult<Reservation> {
        self.charge(bytes)?;
        Ok(Reservation {
            allocator: Arc::clone(self),
            size: bytes,
        })
    }

    /// Returns allocator statistics.
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        let state = self.state.lock();
        AllocatorStats {
            limit: self.limit,
            allocated: state.allocated,
            peak: state.peak,
            failures: state.failures,
        }
    }

    fn charge(&self, bytes: usize) -> KestrelResult<()> {
        let mut state = self.state.lock();
        let available = self.limit.saturating_sub(state.allocated);
        if bytes > available {
            state.failures += 1;
            warn!(
                requested = bytes,
                available,
                limit = self.limit,
                "allocation refused"
            );
            return Err(KestrelError::AllocationFailed {
                requested: bytes,
                available,
                limit: self.limit,
            });
        }
        state.allocated += bytes;
        state.peak = state.peak.max(state.allocated);
        trace!(bytes, allocated = state.allocated, "reserved");
        Ok(())
    }

    fn release(&self, bytes: usize) {
        let mut state = self.state.lock();
        state.allocated = state.allocated.saturating_sub(bytes);
    }
}

impl fmt::Debug for BufferAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BufferAllocator")
            .field("limit", &self.limit)
            .field("allocated", &state.allocated)
            .field("peak", &state.peak)
            .finish()
    }
}

/// Statistics about an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Byte limit.
    pub limit: usize,
    /// Bytes currently reserved.
    pub allocated: usize,
    /// Highest value `allocated` has reached.
    pub peak: usize,
    /// Number of refused reservations.
    pub failures: u64,
}

/// Bytes held against a [`BufferAllocator`].
///
/// Dropping the reservation returns its bytes.
#[derive(Debug)]
pub struct Reservation {
    allocator: Arc<BufferAllocator>,
    size: usize,
}

impl Reservation {
    /// Returns the number of bytes held.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns true if nothing is held.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Grows the reservation by `bytes`.
    ///
    /// On failure the reservation keeps its previous size.
    pub fn grow(&mut self, bytes: usize) -> KestrelResult<()> {
        self.allocator.charge(bytes)?;
        self.size += bytes;
        Ok(())
    }

    /// Returns up to `bytes` to the allocator.
    pub fn shrink(&mut self, bytes: usize) {
        let bytes = bytes.min(self.size);
        self.allocator.release(bytes);
        self.size -= bytes;
    }

    /// Returns every held byte. Calling this more than once is a no-op.
    pub fn free(&mut self) {
        if self.size > 0 {
            self.allocator.release(self.size);
            self.size = 0;
        }
    }

    /// Returns the allocator this reservation charges.
    #[must_use]
    pub fn allocator(&self) -> &Arc<BufferAllocator> {
        &self.allocator
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.free();
    }
}
