//! Inline block headers and payload pointers.
//!
//! Every block starts with a fixed-size header stored directly in the arena,
//! followed by its payload:
//!
//! ```text
//! offset  0        8           16       24
//!         +--------+-----------+--------+---------------------+
//!         |  size  | ref_count |  link  | payload (size bytes) |
//!         +--------+-----------+--------+---------------------+
//!                                       ^
//!                                       PoolPtr
//! ```
//!
//! All fields are little-endian. `link` holds the header offset of the next
//! block in whichever list currently owns this block, or `u64::MAX` at the
//! end of the list.

use std::fmt;

use serde::Serialize;

use crate::constants::{ALIGNMENT, HEADER_SIZE};

const NIL: u64 = u64::MAX;

/// Round `n` up to the next multiple of [`ALIGNMENT`].
///
/// Returns `None` on overflow.
#[must_use]
pub const fn align_up(n: usize) -> Option<usize> {
    match n.checked_add(ALIGNMENT - 1) {
        Some(v) => Some(v & !(ALIGNMENT - 1)),
        None => None,
    }
}

/// Payload span reserved for a request of `size` bytes.
#[must_use]
pub const fn payload_span(size: usize) -> Option<usize> {
    align_up(size)
}

/// Payload pointer: the arena offset of a block's first payload byte.
///
/// A `PoolPtr` never points at a header; the header always sits
/// [`HEADER_SIZE`] bytes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PoolPtr(usize);

impl PoolPtr {
    /// Build a pointer from a raw arena offset.
    ///
    /// Offsets that do not name a live payload are rejected by every pool
    /// operation with [`PoolError::UnknownPointer`](crate::PoolError::UnknownPointer).
    #[must_use]
    pub const fn from_offset(offset: usize) -> Self {
        Self(offset)
    }

    /// Arena offset of the payload.
    #[must_use]
    pub const fn offset(self) -> usize {
        self.0
    }

    pub(crate) const fn from_header(at: usize) -> Self {
        Self(at + HEADER_SIZE)
    }

    /// Caller must have checked the pointer against the live map.
    pub(crate) const fn header(self) -> usize {
        self.0 - HEADER_SIZE
    }
}

impl fmt::Display for PoolPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub size: usize,
    pub ref_count: i64,
    pub link: Option<usize>,
}

impl Header {
    pub(crate) const fn free(size: usize, link: Option<usize>) -> Self {
        Self {
            size,
            ref_count: 0,
            link,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn read(bytes: &[u8], at: usize) -> Self {
        let size = read_u64(bytes, at) as usize;
        let ref_count = i64::from_le_bytes(word(bytes, at + 8));
        let link = match read_u64(bytes, at + 16) {
            NIL => None,
            next => Some(next as usize),
        };
        Self {
            size,
            ref_count,
            link,
        }
    }

    pub(crate) fn write(self, bytes: &mut [u8], at: usize) {
        let link = self.link.map_or(NIL, |next| next as u64);
        bytes[at..at + 8].copy_from_slice(&(self.size as u64).to_le_bytes());
        bytes[at + 8..at + 16].copy_from_slice(&self.ref_count.to_le_bytes());
        bytes[at + 16..at + 24].copy_from_slice(&link.to_le_bytes());
    }
}

fn word(bytes: &[u8], at: usize) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    buf
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(word(bytes, at))
}

/// Which list a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockLocation {
    /// Reachable from the free list.
    Free,
    /// Reachable from the allocated list.
    Allocated,
    /// Reachable from neither list. Never observed in a healthy pool.
    Unlisted,
}

/// Snapshot of one block, as found by walking the arena in address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockInfo {
    /// Arena offset of the header.
    pub offset: usize,
    /// Payload pointer.
    pub ptr: PoolPtr,
    /// Payload bytes, excluding the header.
    pub size: usize,
    /// Reference count stored in the header.
    pub ref_count: i64,
    /// List membership.
    pub location: BlockLocation,
}

impl BlockInfo {
    /// Bytes covered by the block, header included.
    #[must_use]
    pub const fn span(&self) -> usize {
        HEADER_SIZE + self.size
    }
}
