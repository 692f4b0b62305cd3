//! Workspace-level integration tests for refpool.
//!
//! The tests live in `tests/`; this crate only re-exports the allocator so
//! they can reach it through one path.

pub use refpool_memory as memory;
