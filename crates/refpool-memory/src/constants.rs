//! Layout and sizing constants for the pool allocator.

/// Default arena size in bytes (64 KiB).
pub const DEFAULT_ARENA_SIZE: usize = 64 * 1024;

/// Payload alignment in bytes. Every payload span is a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Size of the inline block header: `size: u64`, `ref_count: i64`, `link: u64`.
pub const HEADER_SIZE: usize = 24;

/// Smallest arena able to hold a single block with a one-unit payload.
pub const MIN_ARENA_SIZE: usize = HEADER_SIZE + ALIGNMENT;

/// Smallest remainder worth splitting off as its own free block.
pub const MIN_SPLIT_REMAINDER: usize = HEADER_SIZE + ALIGNMENT;
