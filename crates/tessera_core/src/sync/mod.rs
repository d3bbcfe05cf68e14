//! # Boundary Synchronization
//!
//! Allocators never lock - the hot path assumes a single writer per pool.
//! Call sites that must allocate from several threads opt in here, at the
//! boundary, with either primitive:
//!
//! - [`SpinLock`] for very short critical sections (an allocate or free
//!   is a handful of instructions)
//! - `parking_lot::Mutex` through the [`SharedRegistry`] /
//!   [`SharedGrowingPool`] aliases when sections may be longer

mod spinlock;

pub use spinlock::{SpinLock, SpinLockGuard};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::memory::{GrowingPool, PoolRegistry};

/// A registry shared across threads behind a mutex, by call-site choice.
pub type SharedRegistry = Arc<Mutex<PoolRegistry>>;

/// A growing pool list shared across threads behind a mutex.
pub type SharedGrowingPool<T> = Arc<Mutex<GrowingPool<T>>>;

/// Wraps a registry for shared cross-thread use.
#[must_use]
pub fn share_registry(registry: PoolRegistry) -> SharedRegistry {
    Arc::new(Mutex::new(registry))
}

/// Wraps a growing pool list for shared cross-thread use.
#[must_use]
pub fn share_growing<T: Send + 'static>(pool: GrowingPool<T>) -> SharedGrowingPool<T> {
    Arc::new(Mutex::new(pool))
}
