//! # TESSERA Core
//!
//! Fixed-chunk object allocation for high-churn engine objects:
//! - One arena per pool, equal-size chunks, O(1) allocate and free
//! - One lazily created pool per object type (widgets, resource buckets)
//! - Growing pool lists for unbounded object counts (animation handles)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   ALLOCATION PIPELINE                     │
//! ├───────────────────────────────────────────────────────────┤
//! │  caller ──► PoolRegistry ──┐                              │
//! │                            ├──► PoolAllocator ──► chunk   │
//! │  caller ──► GrowingPool ───┘         │                    │
//! │                                 free list (LIFO)          │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **No general-purpose allocation per object** - arenas are claimed
//!    once, chunks are recycled through an intrusive free list
//! 2. **Single-writer pools** - the hot path never locks; call sites that
//!    share an allocator opt in through the [`sync`] module
//! 3. **Observable memory** - every pool reports used/peak/total bytes,
//!    mergeable into a subsystem-wide [`MemoryReport`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::PoolRegistry;
//!
//! let mut registry = PoolRegistry::new();
//! let handle = registry.allocate(Tooltip::default())?;
//! // ... use it through registry.get_mut(handle) ...
//! let _tooltip = registry.deallocate(handle)?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;
pub mod sync;

pub use error::{AllocError, AllocResult, ConfigError};
pub use memory::{
    Allocator, GrowingHandle, GrowingPool, MemoryConfig, MemoryReport, PoolAllocator,
    PoolRegistry, TypedHandle, DEFAULT_CHUNK_COUNT,
};
pub use sync::{share_growing, share_registry, SharedGrowingPool, SharedRegistry, SpinLock, SpinLockGuard};
