//! # Typed Pool Registry
//!
//! One lazily created pool per object type. Call sites ask for a live
//! value of type `T` without knowing the fixed-capacity math; the registry
//! sizes each pool as `size_of::<T>() * chunk_count` on first request.
//!
//! Exhaustion is a hard error here - registry pools never grow. Use a
//! [`GrowingPool`](super::GrowingPool) for unbounded object counts.

// In-place construction into raw chunks; unsafety is confined to this
// file and every access is liveness-checked first.
#![allow(unsafe_code)]

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use super::allocator::{Allocator, MemoryReport};
use super::config::{MemoryConfig, DEFAULT_CHUNK_COUNT};
use super::pool::PoolAllocator;
use crate::error::{AllocError, AllocResult};

/// Copyable lookup key for a value living in a registry pool.
///
/// A handle never owns the value; all access goes through the registry,
/// which checks liveness first. Stale handles (after deallocation) are
/// rejected, never dereferenced.
pub struct TypedHandle<T> {
    ptr: NonNull<T>,
}

impl<T> TypedHandle<T> {
    const fn new(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    /// Address of the underlying slot, for diagnostics only.
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

impl<T> Clone for TypedHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedHandle<T> {}

impl<T> fmt::Debug for TypedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandle")
            .field("address", &self.address())
            .finish()
    }
}

impl<T> PartialEq for TypedHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for TypedHandle<T> {}

impl<T> Hash for TypedHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

/// A pool that hands out slots for exactly one type.
struct TypedPool<T: Send + 'static> {
    pool: PoolAllocator,
    _marker: PhantomData<T>,
}

impl<T: Send + 'static> TypedPool<T> {
    fn new(chunk_count: usize) -> AllocResult<Self> {
        let mut pool = PoolAllocator::for_type::<T>(chunk_count);
        pool.init()?;
        Ok(Self {
            pool,
            _marker: PhantomData,
        })
    }

    fn allocate(&mut self, value: T) -> AllocResult<TypedHandle<T>> {
        let raw = self.pool.allocate(mem::size_of::<T>(), mem::align_of::<T>())?;
        let slot = raw.cast::<T>();
        // Safety: the chunk holds at least size_of::<T>() bytes at T's
        // alignment, and it is not aliased until handed back.
        unsafe { slot.as_ptr().write(value) };
        Ok(TypedHandle::new(slot))
    }

    fn deallocate(&mut self, handle: TypedHandle<T>) -> AllocResult<T> {
        let raw = handle.ptr.cast::<u8>();
        if !self.pool.is_live(raw) {
            return Err(AllocError::InvalidFree {
                address: handle.address(),
            });
        }
        // Move the value out before the free-list link overwrites the slot.
        // Safety: the slot is live, so it holds a constructed T.
        let value = unsafe { handle.ptr.as_ptr().read() };
        self.pool.free(raw)?;
        Ok(value)
    }

    fn get(&self, handle: TypedHandle<T>) -> Option<&T> {
        if self.pool.is_live(handle.ptr.cast()) {
            // Safety: liveness verified; the borrow is tied to &self.
            Some(unsafe { &*handle.ptr.as_ptr() })
        } else {
            None
        }
    }

    fn get_mut(&mut self, handle: TypedHandle<T>) -> Option<&mut T> {
        if self.pool.is_live(handle.ptr.cast()) {
            // Safety: liveness verified; the borrow is tied to &mut self.
            Some(unsafe { &mut *handle.ptr.as_ptr() })
        } else {
            None
        }
    }
}

impl<T: Send + 'static> Drop for TypedPool<T> {
    fn drop(&mut self) {
        let mut dropped = 0usize;
        for index in 0..self.pool.chunk_count() {
            if !self.pool.is_live_at(index) {
                continue;
            }
            // Safety: live slots hold constructed values; the arena is
            // released after this walk, so nothing can observe the slot.
            unsafe { self.pool.chunk_at(index).cast::<T>().as_ptr().drop_in_place() };
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} live {} at pool teardown",
                dropped,
                type_name::<T>()
            );
        }
    }
}

/// Type-erased registry entry.
trait RegistryEntry: Any + Send {
    fn report(&self) -> MemoryReport;
    fn live_count(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + 'static> RegistryEntry for TypedPool<T> {
    fn report(&self) -> MemoryReport {
        self.pool.report()
    }

    fn live_count(&self) -> usize {
        self.pool.used_size() / self.pool.chunk_size()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Maps a type to a lazily created, fixed-capacity pool for that type.
///
/// Pools appear on first request and live until the registry is torn
/// down; entries are never removed. A pool that runs out of chunks is a
/// hard [`OutOfMemory`](AllocError::OutOfMemory) - this registry does not
/// grow.
///
/// # Teardown
///
/// Dropping the registry drops every value still live in its pools and
/// logs a warning naming the type and count. Releasing everything before
/// shutdown keeps the log quiet; the memory is reclaimed either way.
///
/// # Thread Safety
///
/// Single-writer, like the pools it owns. Wrap in a lock at the call-site
/// boundary to share (see the `sync` module).
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = PoolRegistry::new();
///
/// let handle = registry.allocate(Tooltip::default())?;
/// registry.get_mut(handle).unwrap().visible = true;
/// let _tooltip = registry.deallocate(handle)?;
/// ```
pub struct PoolRegistry {
    pools: HashMap<TypeId, Box<dyn RegistryEntry>>,
    chunk_count: usize,
    overrides: HashMap<String, usize>,
}

impl PoolRegistry {
    /// Creates a registry with the default per-pool chunk count.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_count(DEFAULT_CHUNK_COUNT)
    }

    /// Creates a registry whose pools each hold `chunk_count` values.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_count` is zero.
    #[must_use]
    pub fn with_chunk_count(chunk_count: usize) -> Self {
        assert!(chunk_count > 0, "Chunk count must be greater than zero");
        Self {
            pools: HashMap::new(),
            chunk_count,
            overrides: HashMap::new(),
        }
    }

    /// Creates a registry from a loaded [`MemoryConfig`].
    #[must_use]
    pub fn with_config(config: &MemoryConfig) -> Self {
        let mut registry = Self::with_chunk_count(config.chunk_count);
        registry.overrides = config.overrides.clone();
        registry
    }

    /// Hands out a live value of type `T`, creating the type's pool on
    /// first request.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] when the type's pool is exhausted (the
    /// registry never grows a pool) or the arena cannot be reserved.
    pub fn allocate<T: Send + 'static>(&mut self, value: T) -> AllocResult<TypedHandle<T>> {
        if let Some(typed) = self.typed_mut::<T>() {
            return typed.allocate(value);
        }

        let count = self.chunk_count_for(type_name::<T>());
        tracing::debug!("Creating {} pool ({} chunks)", type_name::<T>(), count);
        let mut typed = TypedPool::<T>::new(count)?;
        let handle = typed.allocate(value)?;
        self.pools.insert(TypeId::of::<T>(), Box::new(typed));
        Ok(handle)
    }

    /// Takes the value back out of its pool, recycling the chunk.
    ///
    /// The value is returned to the caller and drops there - the typed
    /// equivalent of destruct-then-release.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidFree`] when the handle is stale (already
    /// deallocated) or no pool exists for `T`.
    pub fn deallocate<T: Send + 'static>(&mut self, handle: TypedHandle<T>) -> AllocResult<T> {
        match self.typed_mut::<T>() {
            Some(typed) => typed.deallocate(handle),
            None => Err(AllocError::InvalidFree {
                address: handle.address(),
            }),
        }
    }

    /// Borrows the value behind `handle`, or `None` if it is stale.
    #[must_use]
    pub fn get<T: Send + 'static>(&self, handle: TypedHandle<T>) -> Option<&T> {
        self.typed::<T>()?.get(handle)
    }

    /// Mutably borrows the value behind `handle`, or `None` if it is stale.
    #[must_use]
    pub fn get_mut<T: Send + 'static>(&mut self, handle: TypedHandle<T>) -> Option<&mut T> {
        self.typed_mut::<T>()?.get_mut(handle)
    }

    /// True when a pool for `T` has already been created.
    #[must_use]
    pub fn contains_pool<T: Send + 'static>(&self) -> bool {
        self.pools.contains_key(&TypeId::of::<T>())
    }

    /// Number of type pools created so far.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Number of live values across all pools.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.pools.values().map(|entry| entry.live_count()).sum()
    }

    /// Counter snapshot for the pool of `T`, if it exists.
    #[must_use]
    pub fn pool_report<T: Send + 'static>(&self) -> Option<MemoryReport> {
        Some(self.typed::<T>()?.pool.report())
    }

    /// Aggregated counter snapshot across every pool.
    #[must_use]
    pub fn report(&self) -> MemoryReport {
        let mut report = MemoryReport::default();
        for entry in self.pools.values() {
            report.merge(entry.report());
        }
        report
    }

    /// Tears the registry down, logging a final footprint report.
    pub fn shutdown(self) {
        let report = self.report();
        tracing::info!(
            "Registry shutdown: {} pools, {} of {} bytes in use (peak {})",
            self.pool_count(),
            report.used,
            report.total,
            report.peak
        );
    }

    fn chunk_count_for(&self, type_path: &str) -> usize {
        self.overrides
            .get(type_path)
            .copied()
            .unwrap_or(self.chunk_count)
    }

    fn typed<T: Send + 'static>(&self) -> Option<&TypedPool<T>> {
        self.pools.get(&TypeId::of::<T>())?.as_any().downcast_ref()
    }

    fn typed_mut<T: Send + 'static>(&mut self) -> Option<&mut TypedPool<T>> {
        self.pools
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut()
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Tween {
        elapsed: f32,
        duration: f32,
    }

    struct DropCounter {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_allocate_get_deallocate() {
        let mut registry = PoolRegistry::new();

        let handle = registry
            .allocate(Tween {
                elapsed: 0.0,
                duration: 1.0,
            })
            .unwrap();
        assert_eq!(registry.get(handle).unwrap().duration, 1.0);

        registry.get_mut(handle).unwrap().elapsed = 0.5;
        let tween = registry.deallocate(handle).unwrap();
        assert_eq!(tween.elapsed, 0.5);
        assert!(registry.get(handle).is_none());
    }

    #[test]
    fn test_round_trip_does_not_grow() {
        let mut registry = PoolRegistry::new();

        // Prime the pool so total_size is observable.
        let handle = registry.allocate(0u64).unwrap();
        registry.deallocate(handle).unwrap();
        let total = registry.pool_report::<u64>().unwrap().total;

        for i in 0..10_000u64 {
            let handle = registry.allocate(i).unwrap();
            registry.deallocate(handle).unwrap();
        }

        let report = registry.pool_report::<u64>().unwrap();
        assert_eq!(report.used, 0);
        assert_eq!(report.total, total);
        assert_eq!(registry.pool_count(), 1);
    }

    #[test]
    fn test_exhaustion_is_a_hard_failure() {
        let mut registry = PoolRegistry::with_chunk_count(2);

        let _a = registry.allocate(1u32).unwrap();
        let _b = registry.allocate(2u32).unwrap();
        assert!(matches!(
            registry.allocate(3u32),
            Err(AllocError::OutOfMemory { .. })
        ));
        // No growth happened on the way to the failure.
        assert_eq!(registry.pool_count(), 1);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_one_pool_per_type() {
        let mut registry = PoolRegistry::new();

        let number = registry.allocate(7u32).unwrap();
        let tween = registry
            .allocate(Tween {
                elapsed: 0.0,
                duration: 2.0,
            })
            .unwrap();

        assert_eq!(registry.pool_count(), 2);
        assert!(registry.contains_pool::<u32>());
        assert!(registry.contains_pool::<Tween>());
        assert!(!registry.contains_pool::<u64>());

        // Freeing one type leaves the other pool's counters alone.
        registry.deallocate(number).unwrap();
        assert_eq!(registry.pool_report::<u32>().unwrap().used, 0);
        assert!(registry.pool_report::<Tween>().unwrap().used > 0);
        registry.deallocate(tween).unwrap();
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut registry = PoolRegistry::new();

        let handle = registry.allocate(42u32).unwrap();
        registry.deallocate(handle).unwrap();

        assert!(matches!(
            registry.deallocate(handle),
            Err(AllocError::InvalidFree { .. })
        ));
        assert!(registry.get(handle).is_none());
        assert!(registry.get_mut(handle).is_none());
    }

    #[test]
    fn test_teardown_drops_live_values() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut registry = PoolRegistry::new();

        for _ in 0..3 {
            registry
                .allocate(DropCounter {
                    drops: Arc::clone(&drops),
                })
                .unwrap();
        }
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(registry);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_deallocated_values_do_not_drop_twice() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut registry = PoolRegistry::new();

        let handle = registry
            .allocate(DropCounter {
                drops: Arc::clone(&drops),
            })
            .unwrap();
        drop(registry.deallocate(handle).unwrap());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        drop(registry);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_override_applies() {
        let mut config = MemoryConfig::default();
        config
            .overrides
            .insert(type_name::<u16>().to_string(), 2);

        let mut registry = PoolRegistry::with_config(&config);
        let _a = registry.allocate(1u16).unwrap();
        let _b = registry.allocate(2u16).unwrap();
        assert!(registry.allocate(3u16).is_err());

        // Types without an override still get the default capacity.
        let report_handle = registry.allocate(1u64).unwrap();
        let report = registry.pool_report::<u64>().unwrap();
        assert!(report.total > report.used);
        registry.deallocate(report_handle).unwrap();
    }

    #[test]
    fn test_aggregate_report() {
        let mut registry = PoolRegistry::with_chunk_count(4);

        let _a = registry.allocate(1u32).unwrap();
        let _b = registry.allocate(2u64).unwrap();

        let report = registry.report();
        let typed_total = registry.pool_report::<u32>().unwrap().total
            + registry.pool_report::<u64>().unwrap().total;
        assert_eq!(report.total, typed_total);
        assert_eq!(report.used + report.available, report.total);
        assert_eq!(registry.live_count(), 2);
    }
}
