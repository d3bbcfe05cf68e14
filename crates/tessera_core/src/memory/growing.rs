//! # Growing Pool List
//!
//! An append-only list of same-geometry pools for object populations with
//! no capacity ceiling (active animation handles, transient effects).
//! Allocation scans pools in creation order and appends a new pool only
//! when every existing one is exhausted; the list never shrinks.

// In-place construction into raw chunks; unsafety is confined to this
// file and every access is liveness-checked first.
#![allow(unsafe_code)]

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use super::allocator::{Allocator, MemoryReport};
use super::config::{MemoryConfig, DEFAULT_CHUNK_COUNT};
use super::pool::PoolAllocator;
use crate::error::{AllocError, AllocResult};

/// Copyable key for a value living in a growing pool list.
///
/// Carries the back-reference to the pool that produced the value (its
/// index in creation order), so freeing never scans the list.
pub struct GrowingHandle<T> {
    pool_index: usize,
    ptr: NonNull<T>,
}

impl<T> GrowingHandle<T> {
    /// Index of the owning pool in creation order.
    #[must_use]
    pub const fn pool_index(&self) -> usize {
        self.pool_index
    }

    /// Address of the underlying slot, for diagnostics only.
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

impl<T> Clone for GrowingHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GrowingHandle<T> {}

impl<T> fmt::Debug for GrowingHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowingHandle")
            .field("pool_index", &self.pool_index)
            .field("address", &self.address())
            .finish()
    }
}

impl<T> PartialEq for GrowingHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pool_index == other.pool_index && self.ptr == other.ptr
    }
}

impl<T> Eq for GrowingHandle<T> {}

/// An unbounded population of `T` over fixed-capacity pools.
///
/// Each pool holds `chunk_count` values. Allocation prefers pools in
/// creation order (first fit); when all are full, a fresh pool is
/// appended and the list keeps it forever - pools are never removed, even
/// when they drain empty.
///
/// # Per-frame maintenance
///
/// [`retain`](GrowingPool::retain) walks every live value once and evicts
/// the ones whose lifecycle has completed, recycling their chunks into
/// the pool that produced them. Callers drive this once per frame.
///
/// # Thread Safety
///
/// Single-writer. Wrap in a lock at the call-site boundary to share (see
/// the `sync` module).
///
/// # Example
///
/// ```rust,ignore
/// let mut tweens: GrowingPool<Tween> = GrowingPool::new();
///
/// tweens.allocate(Tween::new(0.0, 1.0, 0.2))?;
///
/// // Once per frame: advance everything, drop what finished.
/// tweens.retain(|tween| {
///     tween.update(dt);
///     !tween.is_complete()
/// });
/// ```
pub struct GrowingPool<T: Send + 'static> {
    pools: Vec<PoolAllocator>,
    chunk_count: usize,
    _marker: PhantomData<T>,
}

impl<T: Send + 'static> GrowingPool<T> {
    /// Creates an empty list with the default per-pool chunk count.
    ///
    /// No memory is claimed until the first allocation.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_count(DEFAULT_CHUNK_COUNT)
    }

    /// Creates an empty list whose pools each hold `chunk_count` values.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_count` is zero.
    #[must_use]
    pub fn with_chunk_count(chunk_count: usize) -> Self {
        assert!(chunk_count > 0, "Chunk count must be greater than zero");
        Self {
            pools: Vec::new(),
            chunk_count,
            _marker: PhantomData,
        }
    }

    /// Creates an empty list sized from a loaded [`MemoryConfig`].
    #[must_use]
    pub fn with_config(config: &MemoryConfig) -> Self {
        Self::with_chunk_count(config.growing_chunk_count)
    }

    /// Stores `value`, growing the pool list if every pool is full.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] only when a fresh pool's arena cannot
    /// be reserved - exhaustion of existing pools triggers growth, not
    /// failure.
    pub fn allocate(&mut self, value: T) -> AllocResult<GrowingHandle<T>> {
        let size = mem::size_of::<T>();
        let align = mem::align_of::<T>();

        // First fit, in creation order.
        for (index, pool) in self.pools.iter_mut().enumerate() {
            if pool.free_count() > 0 {
                let raw = pool.allocate(size, align)?;
                return Ok(Self::emplace(index, raw, value));
            }
        }

        // All pools exhausted: append a fresh one. The list only grows.
        let mut pool = PoolAllocator::for_type::<T>(self.chunk_count);
        pool.init()?;
        let raw = pool.allocate(size, align)?;
        self.pools.push(pool);
        tracing::debug!(
            "Grew {} pool list to {} pools",
            type_name::<T>(),
            self.pools.len()
        );
        Ok(Self::emplace(self.pools.len() - 1, raw, value))
    }

    /// Takes `value` back out of the pool that produced it.
    ///
    /// The back-reference in the handle routes the chunk straight to its
    /// owning pool - no scan.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidFree`] when the handle is stale or was never
    /// produced by this list.
    pub fn free(&mut self, handle: GrowingHandle<T>) -> AllocResult<T> {
        let Some(pool) = self.pools.get_mut(handle.pool_index) else {
            return Err(AllocError::InvalidFree {
                address: handle.address(),
            });
        };
        let raw = handle.ptr.cast::<u8>();
        if !pool.is_live(raw) {
            return Err(AllocError::InvalidFree {
                address: handle.address(),
            });
        }
        // Move the value out before the free-list link overwrites the slot.
        // Safety: the slot is live, so it holds a constructed T.
        let value = unsafe { handle.ptr.as_ptr().read() };
        pool.free(raw)?;
        Ok(value)
    }

    /// Borrows the value behind `handle`, or `None` if it is stale.
    #[must_use]
    pub fn get(&self, handle: GrowingHandle<T>) -> Option<&T> {
        let pool = self.pools.get(handle.pool_index)?;
        if pool.is_live(handle.ptr.cast()) {
            // Safety: liveness verified; the borrow is tied to &self.
            Some(unsafe { &*handle.ptr.as_ptr() })
        } else {
            None
        }
    }

    /// Mutably borrows the value behind `handle`, or `None` if it is stale.
    #[must_use]
    pub fn get_mut(&mut self, handle: GrowingHandle<T>) -> Option<&mut T> {
        let pool = self.pools.get(handle.pool_index)?;
        if pool.is_live(handle.ptr.cast()) {
            // Safety: liveness verified; the borrow is tied to &mut self.
            Some(unsafe { &mut *handle.ptr.as_ptr() })
        } else {
            None
        }
    }

    /// Walks every live value once, keeping those for which `keep`
    /// returns true and evicting the rest into their owning pools.
    ///
    /// This is the once-per-frame maintenance pass: advance lifecycles in
    /// the closure and return false for values that finished.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        for pool in &mut self.pools {
            for index in 0..pool.chunk_count() {
                if !pool.is_live_at(index) {
                    continue;
                }
                let slot = pool.chunk_at(index).cast::<T>();
                // Safety: live slots hold constructed values; the borrow
                // ends before the slot is freed below.
                if !keep(unsafe { &mut *slot.as_ptr() }) {
                    // Safety: still live; drop the value, recycle the chunk.
                    unsafe { slot.as_ptr().drop_in_place() };
                    let _ = pool.free(slot.cast());
                }
            }
        }
    }

    /// Visits every live value mutably, in pool-creation order.
    pub fn for_each_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut T),
    {
        self.retain(|value| {
            visit(value);
            true
        });
    }

    /// Iterates every live value, in pool-creation order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pools.iter().flat_map(|pool| {
            pool.live_chunks()
                // Safety: live chunks hold constructed values; the borrow
                // is tied to &self.
                .map(|chunk| unsafe { &*chunk.cast::<T>().as_ptr() })
        })
    }

    /// Evicts every live value. Pools are kept - capacity never shrinks.
    pub fn clear(&mut self) {
        self.retain(|_| false);
    }

    /// Number of live values across all pools.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.pools
            .iter()
            .map(|pool| pool.used_size() / pool.chunk_size())
            .sum()
    }

    /// True when no value is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Number of pools created so far. Monotonically non-decreasing.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Chunk capacity of each pool in the list.
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Counter snapshot for the pool at `index` in creation order.
    #[must_use]
    pub fn pool_report(&self, index: usize) -> Option<MemoryReport> {
        Some(self.pools.get(index)?.report())
    }

    /// Aggregated counter snapshot across every pool.
    #[must_use]
    pub fn report(&self) -> MemoryReport {
        let mut report = MemoryReport::default();
        for pool in &self.pools {
            report.merge(pool.report());
        }
        report
    }

    /// Tears the list down, logging a final footprint report.
    pub fn shutdown(self) {
        let report = self.report();
        tracing::info!(
            "{} pool list shutdown: {} pools, {} of {} bytes in use (peak {})",
            type_name::<T>(),
            self.pool_count(),
            report.used,
            report.total,
            report.peak
        );
    }

    fn emplace(pool_index: usize, raw: NonNull<u8>, value: T) -> GrowingHandle<T> {
        let slot = raw.cast::<T>();
        // Safety: the chunk holds at least size_of::<T>() bytes at T's
        // alignment, and it is not aliased until handed back.
        unsafe { slot.as_ptr().write(value) };
        GrowingHandle {
            pool_index,
            ptr: slot,
        }
    }
}

impl<T: Send + 'static> Default for GrowingPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for GrowingPool<T> {
    fn drop(&mut self) {
        let mut dropped = 0usize;
        for pool in &mut self.pools {
            for index in 0..pool.chunk_count() {
                if !pool.is_live_at(index) {
                    continue;
                }
                // Safety: live slots hold constructed values; the arenas
                // are released after this walk.
                unsafe { pool.chunk_at(index).cast::<T>().as_ptr().drop_in_place() };
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} live {} at pool list teardown",
                dropped,
                type_name::<T>()
            );
        }
    }
}
