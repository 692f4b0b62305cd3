//! # refpool-memory
//!
//! Fixed-capacity pool allocator with manual reference counting.
//!
//! A single arena is reserved once from a [`MemorySource`]. Blocks are carved
//! from it with inline headers, handed out as [`PoolPtr`] payload offsets, and
//! returned to a free list when their reference count reaches zero.
//! [`SharedPool`] and [`PoolRef`] wrap the same machinery in owning handles.
#![warn(missing_docs)]

pub mod arena;
pub mod block;
pub mod config;
pub mod constants;
pub mod error;
mod live;
pub mod pool;
pub mod shared;
pub mod source;
pub mod stats;

pub use arena::Arena;
pub use block::{BlockInfo, BlockLocation, PoolPtr};
pub use config::{PoolConfig, UnknownPointerPolicy};
pub use error::PoolError;
pub use pool::{PoolAllocator, RefRelease};
pub use shared::{PoolRef, SharedPool};
pub use source::{HeapSource, LimitedSource, MemorySource, SourceLedger};
pub use stats::{AtomicPoolStats, PoolStats};
