//! # Allocator Capability
//!
//! The byte-level contract every arena-backed allocator implements.
//! Pure interface; the algorithm lives in the concrete allocators.

use std::ptr::NonNull;

use crate::error::AllocResult;

/// Point-in-time size counters for one allocator.
///
/// Reports from individual pools merge into subsystem-wide totals, which
/// is how a registry or growing pool list reports its whole footprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReport {
    /// Bytes reserved by the arena(s).
    pub total: usize,
    /// Bytes currently charged to live allocations.
    pub used: usize,
    /// High-water mark of `used`.
    pub peak: usize,
    /// Bytes still available (`total - used`).
    pub available: usize,
}

impl MemoryReport {
    /// Folds another report into this one, summing every counter.
    pub fn merge(&mut self, other: Self) {
        self.total += other.total;
        self.used += other.used;
        self.peak += other.peak;
        self.available += other.available;
    }
}

/// Byte-level allocation over a pre-claimed arena.
///
/// # Contract
///
/// - [`init`](Allocator::init) claims the arena and must run before the
///   first allocation; using the allocator earlier is a typed error, not
///   undefined behavior.
/// - `0 <= used <= total` at all times; `peak >= used`, and `peak` never
///   decreases.
/// - Allocate and free are synchronous and O(1); there is no pending or
///   cancellable state.
///
/// # Thread Safety
///
/// Implementations are single-writer. Call sites that share an allocator
/// across threads wrap it at the boundary (see the `sync` module).
pub trait Allocator {
    /// Claims the backing arena.
    ///
    /// Idempotent: a second call on an initialized allocator is a no-op.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`](crate::AllocError::OutOfMemory) when the
    /// arena itself cannot be reserved.
    fn init(&mut self) -> AllocResult<()>;

    /// Hands out a region of at least `size` bytes at `align`.
    ///
    /// The full chunk size is charged to `used` regardless of `size`; the
    /// returned memory is not zeroed.
    ///
    /// # Errors
    ///
    /// [`AllocError::UseBeforeInit`](crate::AllocError::UseBeforeInit)
    /// before [`init`](Allocator::init);
    /// [`AllocError::OutOfMemory`](crate::AllocError::OutOfMemory) when no
    /// chunk is free or the request exceeds the chunk geometry.
    fn allocate(&mut self, size: usize, align: usize) -> AllocResult<NonNull<u8>>;

    /// Returns a previously allocated region to the allocator.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidFree`](crate::AllocError::InvalidFree) when
    /// `ptr` is not a live chunk of this allocator (foreign address,
    /// misaligned address, or double free).
    fn free(&mut self, ptr: NonNull<u8>) -> AllocResult<()>;

    /// Arena base address, for diagnostics and bounds checks only.
    ///
    /// `None` until [`init`](Allocator::init) has claimed the arena.
    /// Callers never do arithmetic on this pointer.
    fn start_ptr(&self) -> Option<NonNull<u8>>;

    /// Bytes currently charged to live allocations.
    fn used_size(&self) -> usize;

    /// Bytes reserved by the arena.
    fn total_size(&self) -> usize;

    /// High-water mark of [`used_size`](Allocator::used_size).
    fn peak_size(&self) -> usize;

    /// Snapshot of this allocator's counters.
    fn report(&self) -> MemoryReport {
        MemoryReport {
            total: self.total_size(),
            used: self.used_size(),
            peak: self.peak_size(),
            available: self.total_size() - self.used_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_merge_sums_counters() {
        let mut report = MemoryReport {
            total: 128,
            used: 64,
            peak: 96,
            available: 64,
        };
        report.merge(MemoryReport {
            total: 256,
            used: 32,
            peak: 32,
            available: 224,
        });

        assert_eq!(report.total, 384);
        assert_eq!(report.used, 96);
        assert_eq!(report.peak, 128);
        assert_eq!(report.available, 288);
    }

    #[test]
    fn test_report_default_is_zeroed() {
        assert_eq!(MemoryReport::default(), MemoryReport {
            total: 0,
            used: 0,
            peak: 0,
            available: 0,
        });
    }
}
