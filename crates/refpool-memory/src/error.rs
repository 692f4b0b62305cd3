//! Error taxonomy for arena reservation and pool operations.

use crate::block::PoolPtr;

/// Errors reported by the arena and the pool allocator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The memory source refused to grant the backing region.
    #[error("arena unavailable: could not reserve {requested} bytes")]
    ArenaUnavailable {
        /// Number of bytes requested.
        requested: usize,
    },

    /// The requested arena cannot hold even a single block.
    #[error("arena of {size} bytes is too small (minimum {min} bytes)")]
    ArenaTooSmall {
        /// Requested arena size.
        size: usize,
        /// Minimum usable arena size.
        min: usize,
    },

    /// No free block can satisfy the request.
    #[error("out of pool space: no block can hold {requested} bytes")]
    OutOfPoolSpace {
        /// Number of payload bytes requested.
        requested: usize,
    },

    /// A zero-byte allocation was requested.
    #[error("zero-size allocation requested")]
    ZeroSizeRequest,

    /// The pointer does not name a block in the allocated list.
    #[error("pointer {0} not found in allocated blocks")]
    UnknownPointer(PoolPtr),

    /// Block bookkeeping is inconsistent.
    #[error("pool corrupted: {0}")]
    Corrupted(String),
}
