//! # Allocation Error Types
//!
//! All errors that can occur in the allocation framework.

use thiserror::Error;

/// Errors that can occur when allocating or freeing pool memory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No free chunk can satisfy the request.
    ///
    /// Raised when the pool is exhausted, when the requested size exceeds
    /// the pool's chunk size, or when the requested alignment is stricter
    /// than the pool's chunk alignment.
    #[error("out of memory: no free chunk for {requested} bytes (align {align})")]
    OutOfMemory {
        /// Size of the rejected request in bytes.
        requested: usize,
        /// Alignment of the rejected request in bytes.
        align: usize,
    },

    /// The allocator was used before `init()` claimed its arena.
    #[error("allocator used before init")]
    UseBeforeInit,

    /// The freed address is not a live chunk of this allocator.
    ///
    /// Covers foreign addresses, addresses off a chunk boundary, and
    /// double frees.
    #[error("invalid free: {address:#x} is not a live chunk of this pool")]
    InvalidFree {
        /// The offending address.
        address: usize,
    },
}

/// Result type for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;

/// Errors that can occur while loading a memory configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config values are out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
