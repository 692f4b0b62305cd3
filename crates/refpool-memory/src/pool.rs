//! Reference-counted pool allocator over a single fixed arena.
//!
//! Blocks carry inline headers (see [`crate::block`]) and sit in exactly one
//! of two singly-linked lists threaded through those headers:
//!
//! - the **free list**, searched first-fit from its head. Freed blocks and
//!   split remainders are prepended, so the most recently freed block is
//!   tried first.
//! - the **allocated list**, holding every block with `ref_count > 0`.
//!
//! The never-used tail of the arena is itself a free block, the *frontier*.
//! It is always the last node of the free list: splitting it leaves the
//! remainder in its place rather than at the head, so recycled blocks are
//! always preferred over virgin space.
//!
//! Adjacent free blocks are never merged. Alternating small and larger
//! requests therefore fragment the arena permanently.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::block::{payload_span, BlockInfo, BlockLocation, Header, PoolPtr};
use crate::config::{PoolConfig, UnknownPointerPolicy};
use crate::constants::{HEADER_SIZE, MIN_ARENA_SIZE, MIN_SPLIT_REMAINDER};
use crate::error::PoolError;
use crate::live::LiveMap;
use crate::source::{HeapSource, MemorySource};
use crate::stats::{AtomicPoolStats, PoolStats};

/// Outcome of dropping one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefRelease {
    /// The block is still live with this many references.
    Retained(i64),
    /// The count reached zero and the block moved to the free list.
    Reclaimed,
}

/// Fixed-capacity allocator with manual reference counting.
///
/// Single-threaded: wrap it in [`SharedPool`](crate::SharedPool) to share it.
///
/// # Panics
///
/// Every operation except [`teardown`](Self::teardown),
/// [`is_alive`](Self::is_alive), [`capacity`](Self::capacity),
/// [`config`](Self::config), [`stats`](Self::stats) and
/// [`reset_stats`](Self::reset_stats) panics once the pool has been torn
/// down. Those never touch the arena.
pub struct PoolAllocator {
    arena: Arena,
    config: PoolConfig,
    free_head: Option<usize>,
    allocated_head: Option<usize>,
    frontier: Option<usize>,
    live: LiveMap,
    stats: AtomicPoolStats,
    alive: bool,
}

impl PoolAllocator {
    /// Create a pool backed by the process heap.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_source(config, Box::new(HeapSource))
    }

    /// Create a pool whose arena is reserved from `source`.
    pub fn with_source(
        config: PoolConfig,
        source: Box<dyn MemorySource>,
    ) -> Result<Self, PoolError> {
        if config.arena_size < MIN_ARENA_SIZE {
            return Err(PoolError::ArenaTooSmall {
                size: config.arena_size,
                min: MIN_ARENA_SIZE,
            });
        }

        let mut arena = Arena::new(source);
        arena.reserve(config.arena_size)?;
        Header::free(config.arena_size - HEADER_SIZE, None).write(arena.bytes_mut(), 0);

        Ok(Self {
            arena,
            config,
            free_head: Some(0),
            allocated_head: None,
            frontier: Some(0),
            live: LiveMap::new(config.arena_size),
            stats: AtomicPoolStats::new(),
            alive: true,
        })
    }

    /// Allocate at least `size` payload bytes.
    ///
    /// Returns `None` for zero-byte requests and when no block fits.
    pub fn allocate(&mut self, size: usize) -> Option<PoolPtr> {
        self.try_allocate(size).ok()
    }

    /// Allocate at least `size` payload bytes, reporting why a request failed.
    pub fn try_allocate(&mut self, size: usize) -> Result<PoolPtr, PoolError> {
        self.assert_alive("allocate");
        if size == 0 {
            return Err(PoolError::ZeroSizeRequest);
        }

        if let Some(span) = payload_span(size) {
            let mut prev = None;
            let mut cursor = self.free_head;
            while let Some(at) = cursor {
                let header = self.header(at);
                if header.size >= span {
                    return Ok(self.claim(prev, at, header, span));
                }
                prev = Some(at);
                cursor = header.link;
            }
        }

        self.stats.record_failed_allocation();
        warn!(
            requested = size,
            free_bytes = self.free_bytes(),
            "no free block large enough"
        );
        Err(PoolError::OutOfPoolSpace { requested: size })
    }

    /// Move the free block at `at` (preceded by `prev`) to the allocated
    /// list, splitting off any usable remainder.
    fn claim(&mut self, prev: Option<usize>, at: usize, mut header: Header, span: usize) -> PoolPtr {
        let from_frontier = self.frontier == Some(at);
        let remainder = header.size - span;
        let mut replacement = header.link;
        let mut split_tail = None;

        if remainder >= MIN_SPLIT_REMAINDER {
            let tail = at + HEADER_SIZE + span;
            let tail_size = remainder - HEADER_SIZE;
            if from_frontier {
                Header::free(tail_size, header.link).write(self.arena.bytes_mut(), tail);
                replacement = Some(tail);
                self.frontier = Some(tail);
            } else {
                split_tail = Some((tail, tail_size));
            }
            header.size = span;
            self.stats.record_split();
            debug!(
                block = at,
                size = span,
                remainder = tail_size,
                "split free block"
            );
        } else if from_frontier {
            self.frontier = None;
        }

        self.set_free_link(prev, replacement);
        if let Some((tail, tail_size)) = split_tail {
            Header::free(tail_size, self.free_head).write(self.arena.bytes_mut(), tail);
            self.free_head = Some(tail);
        }

        header.ref_count = 1;
        header.link = self.allocated_head;
        self.write_header(at, header);
        self.allocated_head = Some(at);

        let ptr = PoolPtr::from_header(at);
        self.live.insert(ptr.offset());
        if from_frontier {
            self.stats.record_carve();
            debug!(%ptr, size = header.size, "allocated from fresh arena space");
        } else {
            self.stats.record_reuse();
            debug!(%ptr, size = header.size, "allocated from free list");
        }
        ptr
    }

    /// Add one reference to a live block, returning the new count.
    pub fn increment_ref(&mut self, ptr: PoolPtr) -> Result<i64, PoolError> {
        self.assert_alive("increment_ref");
        let at = self.locate(ptr)?;
        let mut header = self.header(at);
        header.ref_count += 1;
        self.write_header(at, header);
        debug!(%ptr, ref_count = header.ref_count, "incremented reference count");
        Ok(header.ref_count)
    }

    /// Drop one reference. At zero the block moves to the free list; its
    /// payload bytes are left as they were.
    pub fn decrement_ref(&mut self, ptr: PoolPtr) -> Result<RefRelease, PoolError> {
        self.assert_alive("decrement_ref");
        let at = self.locate(ptr)?;
        let mut header = self.header(at);
        header.ref_count -= 1;
        debug!(%ptr, ref_count = header.ref_count, "decremented reference count");
        if header.ref_count > 0 {
            self.write_header(at, header);
            return Ok(RefRelease::Retained(header.ref_count));
        }

        self.unlink_allocated(at, header.link)?;
        header.link = self.free_head;
        self.write_header(at, header);
        self.free_head = Some(at);
        self.live.remove(ptr.offset());
        self.stats.record_reclaim();
        debug!(%ptr, size = header.size, "block returned to free list");
        Ok(RefRelease::Reclaimed)
    }

    /// Release a pointer slot's reference. `None` is a no-op.
    pub fn release(&mut self, ptr: Option<PoolPtr>) -> Result<Option<RefRelease>, PoolError> {
        self.assert_alive("release");
        ptr.map(|ptr| self.decrement_ref(ptr)).transpose()
    }

    /// Point `slot` at `value`, moving one reference from the old target to
    /// the new one.
    ///
    /// The old target is decremented before the new one is incremented.
    /// Reassigning a slot to the pointer it already holds changes nothing, so
    /// a sole reference is never reclaimed out from under itself. A non-null
    /// `value` that is not live is rejected before the slot is touched. An old
    /// value that is no longer live is reported and the transfer completes.
    pub fn reassign(
        &mut self,
        slot: &mut Option<PoolPtr>,
        value: Option<PoolPtr>,
    ) -> Result<(), PoolError> {
        self.assert_alive("reassign");
        if let Some(new) = value {
            self.locate(new)?;
        }
        if *slot == value {
            debug!(ptr = ?value, "reassign to current target");
            return Ok(());
        }
        if let Some(old) = slot.take() {
            if let Err(err) = self.decrement_ref(old) {
                debug!(%old, %err, "previous slot value was not live");
            }
        }
        *slot = value;
        if let Some(new) = value {
            self.increment_ref(new)?;
        }
        Ok(())
    }

    /// Release the arena and forget every block. Later calls are no-ops.
    pub fn teardown(&mut self) {
        if !self.alive {
            return;
        }
        let outstanding = self.live.len();
        self.arena.release();
        self.free_head = None;
        self.allocated_head = None;
        self.frontier = None;
        self.live.clear();
        self.alive = false;
        info!(outstanding, "pool torn down");
    }

    /// Whether the pool can still serve requests.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Payload bytes of a live block.
    pub fn payload(&self, ptr: PoolPtr) -> Result<&[u8], PoolError> {
        self.assert_alive("payload");
        let size = self.header(self.locate(ptr)?).size;
        Ok(&self.arena.bytes()[ptr.offset()..ptr.offset() + size])
    }

    /// Mutable payload bytes of a live block.
    pub fn payload_mut(&mut self, ptr: PoolPtr) -> Result<&mut [u8], PoolError> {
        self.assert_alive("payload_mut");
        let size = self.header(self.locate(ptr)?).size;
        Ok(&mut self.arena.bytes_mut()[ptr.offset()..ptr.offset() + size])
    }

    /// Reference count of a live block, or `None`.
    #[must_use]
    pub fn ref_count(&self, ptr: PoolPtr) -> Option<i64> {
        self.assert_alive("ref_count");
        self.live
            .contains(ptr.offset())
            .then(|| self.header(ptr.header()).ref_count)
    }

    /// Payload capacity of a live block, or `None`.
    ///
    /// May exceed the requested size when the block was consumed whole.
    #[must_use]
    pub fn block_size(&self, ptr: PoolPtr) -> Option<usize> {
        self.assert_alive("block_size");
        self.live
            .contains(ptr.offset())
            .then(|| self.header(ptr.header()).size)
    }

    /// Whether `ptr` names a block in the allocated list.
    #[must_use]
    pub fn is_live(&self, ptr: PoolPtr) -> bool {
        self.assert_alive("is_live");
        self.live.contains(ptr.offset())
    }

    /// Arena size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.arena_size
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Total payload bytes held by free blocks.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.assert_alive("free_bytes");
        self.walk_list(self.free_head).map(|(_, h)| h.size).sum()
    }

    /// Number of blocks in the allocated list.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.assert_alive("allocated_count");
        self.walk_list(self.allocated_head).count()
    }

    /// Number of blocks in the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.assert_alive("free_count");
        self.walk_list(self.free_head).count()
    }

    /// Payload pointers of the free list, in search order.
    #[must_use]
    pub fn free_list(&self) -> Vec<PoolPtr> {
        self.assert_alive("free_list");
        self.walk_list(self.free_head)
            .map(|(at, _)| PoolPtr::from_header(at))
            .collect()
    }

    /// Payload pointers of the allocated list, most recent first.
    #[must_use]
    pub fn allocated_list(&self) -> Vec<PoolPtr> {
        self.assert_alive("allocated_list");
        self.walk_list(self.allocated_head)
            .map(|(at, _)| PoolPtr::from_header(at))
            .collect()
    }

    /// Every block in address order, with its list membership.
    #[must_use]
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.assert_alive("blocks");
        let free: HashSet<usize> = self.walk_list(self.free_head).map(|(at, _)| at).collect();
        let allocated: HashSet<usize> = self
            .walk_list(self.allocated_head)
            .map(|(at, _)| at)
            .collect();

        let end = self.arena.size();
        let mut blocks = Vec::new();
        let mut at = 0;
        while fits_header(at, end) {
            let header = self.header(at);
            let location = match (free.contains(&at), allocated.contains(&at)) {
                (true, false) => BlockLocation::Free,
                (false, true) => BlockLocation::Allocated,
                _ => BlockLocation::Unlisted,
            };
            blocks.push(BlockInfo {
                offset: at,
                ptr: PoolPtr::from_header(at),
                size: header.size,
                ref_count: header.ref_count,
                location,
            });
            match (at + HEADER_SIZE).checked_add(header.size) {
                Some(next) => at = next,
                None => break,
            }
        }
        blocks
    }

    /// Verify block coverage, list exclusivity, and count/list agreement.
    pub fn check_invariants(&self) -> Result<(), PoolError> {
        self.assert_alive("check_invariants");
        let corrupted = |msg: String| Err(PoolError::Corrupted(msg));

        let free: Vec<usize> = self.walk_list(self.free_head).map(|(at, _)| at).collect();
        let allocated: Vec<usize> = self
            .walk_list(self.allocated_head)
            .map(|(at, _)| at)
            .collect();
        let free_set: HashSet<usize> = free.iter().copied().collect();
        let allocated_set: HashSet<usize> = allocated.iter().copied().collect();
        if free_set.len() != free.len() || allocated_set.len() != allocated.len() {
            return corrupted("a list visits the same block twice".into());
        }
        if let Some(shared) = free_set.intersection(&allocated_set).next() {
            return corrupted(format!("block {shared:#x} is in both lists"));
        }

        let blocks = self.blocks();
        let covered: usize = blocks.iter().map(BlockInfo::span).sum();
        if covered != self.arena.size() {
            return corrupted(format!(
                "blocks cover {covered} of {} arena bytes",
                self.arena.size()
            ));
        }
        if blocks.len() != free.len() + allocated.len() {
            return corrupted(format!(
                "{} blocks in arena but {} listed",
                blocks.len(),
                free.len() + allocated.len()
            ));
        }
        for block in &blocks {
            match block.location {
                BlockLocation::Allocated if block.ref_count <= 0 => {
                    return corrupted(format!(
                        "allocated block {} has ref_count {}",
                        block.ptr, block.ref_count
                    ));
                }
                BlockLocation::Free if block.ref_count > 0 => {
                    return corrupted(format!(
                        "free block {} has ref_count {}",
                        block.ptr, block.ref_count
                    ));
                }
                BlockLocation::Unlisted => {
                    return corrupted(format!("block {} is in neither list", block.ptr));
                }
                _ => {}
            }
            if (block.location == BlockLocation::Allocated) != self.live.contains(block.ptr.offset())
            {
                return corrupted(format!("live map disagrees about {}", block.ptr));
            }
        }
        if let Some(frontier) = self.frontier {
            if free.last() != Some(&frontier) {
                return corrupted("frontier is not the tail of the free list".into());
            }
        }
        Ok(())
    }

    /// Snapshot of allocator activity.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    /// Reset activity counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn assert_alive(&self, op: &str) {
        assert!(self.alive, "{op} called on a torn-down pool");
    }

    fn locate(&self, ptr: PoolPtr) -> Result<usize, PoolError> {
        if self.live.contains(ptr.offset()) {
            return Ok(ptr.header());
        }
        self.stats.record_unknown_pointer();
        match self.config.unknown_pointer {
            UnknownPointerPolicy::Panic => panic!("pointer {ptr} not found in allocated blocks"),
            UnknownPointerPolicy::Report => {
                warn!(%ptr, "pointer not found in allocated blocks");
                Err(PoolError::UnknownPointer(ptr))
            }
        }
    }

    fn header(&self, at: usize) -> Header {
        Header::read(self.arena.bytes(), at)
    }

    fn write_header(&mut self, at: usize, header: Header) {
        header.write(self.arena.bytes_mut(), at);
    }

    fn set_free_link(&mut self, prev: Option<usize>, next: Option<usize>) {
        match prev {
            Some(p) => {
                let mut header = self.header(p);
                header.link = next;
                self.write_header(p, header);
            }
            None => self.free_head = next,
        }
    }

    fn unlink_allocated(&mut self, at: usize, next: Option<usize>) -> Result<(), PoolError> {
        if self.allocated_head == Some(at) {
            self.allocated_head = next;
            return Ok(());
        }
        let mut cursor = self.allocated_head;
        while let Some(current) = cursor {
            let mut header = self.header(current);
            if header.link == Some(at) {
                header.link = next;
                self.write_header(current, header);
                return Ok(());
            }
            cursor = header.link;
        }
        Err(PoolError::Corrupted(format!(
            "block {at:#x} missing from allocated list"
        )))
    }

    /// Iterate a list from `head`. Stops after as many nodes as the arena
    /// could possibly hold, so a cycle cannot hang the walk.
    fn walk_list(&self, head: Option<usize>) -> impl Iterator<Item = (usize, Header)> + '_ {
        let limit = self.arena.size() / HEADER_SIZE + 1;
        let end = self.arena.size();
        let mut cursor = head;
        std::iter::from_fn(move || {
            let at = cursor.filter(|&at| fits_header(at, end))?;
            let header = self.header(at);
            cursor = header.link;
            Some((at, header))
        })
        .take(limit)
    }
}

fn fits_header(at: usize, end: usize) -> bool {
    at.checked_add(HEADER_SIZE).is_some_and(|stop| stop <= end)
}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ALIGNMENT;
    use crate::source::LimitedSource;

    fn pool(size: usize) -> PoolAllocator {
        PoolAllocator::new(PoolConfig::new(size)).unwrap()
    }

    #[test]
    fn fresh_pool_is_one_free_block() {
        let pool = pool(1024);
        let blocks = pool.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[0].size, 1024 - HEADER_SIZE);
        assert_eq!(blocks[0].location, BlockLocation::Free);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn arena_too_small_is_rejected() {
        let err = PoolAllocator::new(PoolConfig::new(MIN_ARENA_SIZE - 1))
            .err()
            .unwrap();
        assert_eq!(
            err,
            PoolError::ArenaTooSmall {
                size: MIN_ARENA_SIZE - 1,
                min: MIN_ARENA_SIZE
            }
        );
    }

    #[test]
    fn denied_arena_surfaces_error() {
        let result =
            PoolAllocator::with_source(PoolConfig::new(4096), Box::new(LimitedSource::new(1024)));
        assert_eq!(
            result.err(),
            Some(PoolError::ArenaUnavailable { requested: 4096 })
        );
    }

    #[test]
    fn zero_size_returns_nothing() {
        let mut pool = pool(1024);
        assert_eq!(pool.allocate(0), None);
        assert_eq!(pool.try_allocate(0), Err(PoolError::ZeroSizeRequest));
        assert_eq!(pool.stats().failed_allocations, 0);
    }

    #[test]
    fn sizes_round_up_to_alignment() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(13).unwrap();
        assert_eq!(pool.block_size(ptr), Some(16));
        assert_eq!(ptr.offset() % ALIGNMENT, 0);
    }

    #[test]
    fn first_allocations_are_carved_in_address_order() {
        let mut pool = pool(1024);
        let a = pool.allocate(16).unwrap();
        let b = pool.allocate(16).unwrap();
        assert_eq!(a.offset(), HEADER_SIZE);
        assert_eq!(b.offset(), a.offset() + 16 + HEADER_SIZE);
        assert_eq!(pool.stats().carves, 2);
        assert_eq!(pool.stats().reuses, 0);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn split_leaves_remainder_free() {
        let mut pool = pool(1024);
        let capacity = 1024 - HEADER_SIZE;
        let ptr = pool.allocate(16).unwrap();
        let blocks = pool.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].size, 16);
        assert_eq!(blocks[0].location, BlockLocation::Allocated);
        assert_eq!(blocks[1].location, BlockLocation::Free);
        assert_eq!(blocks[0].size + blocks[1].span(), capacity);
        assert_eq!(pool.ref_count(ptr), Some(1));
        assert_eq!(pool.stats().splits, 1);
    }

    #[test]
    fn small_remainder_is_consumed_whole() {
        // One block of 40 payload bytes; a 24-byte request leaves 16, which
        // cannot host a header plus an alignment unit.
        let mut pool = pool(HEADER_SIZE + 40);
        let ptr = pool.allocate(24).unwrap();
        assert_eq!(pool.block_size(ptr), Some(40));
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.stats().splits, 0);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn exact_threshold_remainder_is_split() {
        let mut pool = pool(HEADER_SIZE + 16 + MIN_SPLIT_REMAINDER);
        let ptr = pool.allocate(16).unwrap();
        assert_eq!(pool.block_size(ptr), Some(16));
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.free_bytes(), ALIGNMENT);
    }

    #[test]
    fn out_of_space_is_recoverable() {
        let mut pool = pool(128);
        assert_eq!(pool.allocate(1024), None);
        assert_eq!(
            pool.try_allocate(1024),
            Err(PoolError::OutOfPoolSpace { requested: 1024 })
        );
        assert_eq!(pool.stats().failed_allocations, 2);
        assert!(pool.allocate(16).is_some());
    }

    #[test]
    fn huge_request_does_not_overflow() {
        let mut pool = pool(128);
        assert_eq!(
            pool.try_allocate(usize::MAX),
            Err(PoolError::OutOfPoolSpace {
                requested: usize::MAX
            })
        );
        assert_eq!(pool.allocate(2048), None);
        assert_eq!(pool.stats().failed_allocations, 2);
    }

    #[test]
    fn increment_and_decrement_track_counts() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(32).unwrap();
        assert_eq!(pool.increment_ref(ptr), Ok(2));
        assert_eq!(pool.increment_ref(ptr), Ok(3));
        assert_eq!(pool.decrement_ref(ptr), Ok(RefRelease::Retained(2)));
        assert_eq!(pool.decrement_ref(ptr), Ok(RefRelease::Retained(1)));
        assert_eq!(pool.decrement_ref(ptr), Ok(RefRelease::Reclaimed));
        assert!(!pool.is_live(ptr));
        assert_eq!(pool.free_list()[0], ptr);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn reclaimed_payload_is_left_untouched() {
        let mut pool = pool(1024);
        let keep = pool.allocate(8).unwrap();
        let ptr = pool.allocate(8).unwrap();
        pool.payload_mut(ptr).unwrap().copy_from_slice(&[9; 8]);
        pool.decrement_ref(ptr).unwrap();
        let reused = pool.allocate(8).unwrap();
        assert_eq!(reused, ptr);
        assert_eq!(pool.payload(reused).unwrap(), &[9; 8]);
        assert!(pool.is_live(keep));
    }

    #[test]
    fn unknown_pointer_is_reported_not_fatal() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(16).unwrap();
        let bogus = PoolPtr::from_offset(ptr.offset() + 8);
        assert_eq!(pool.increment_ref(bogus), Err(PoolError::UnknownPointer(bogus)));
        assert_eq!(pool.decrement_ref(bogus), Err(PoolError::UnknownPointer(bogus)));
        assert_eq!(pool.release(Some(bogus)), Err(PoolError::UnknownPointer(bogus)));
        assert_eq!(pool.stats().unknown_pointers, 3);
        assert_eq!(pool.ref_count(ptr), Some(1));
        pool.check_invariants().unwrap();
    }

    #[test]
    fn misaligned_and_out_of_range_pointers_are_unknown() {
        let mut pool = pool(1024);
        for offset in [0, 3, HEADER_SIZE + 1, 4096, usize::MAX] {
            let ptr = PoolPtr::from_offset(offset);
            assert_eq!(pool.increment_ref(ptr), Err(PoolError::UnknownPointer(ptr)));
        }
    }

    #[test]
    fn freed_pointer_is_unknown() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(16).unwrap();
        pool.release(Some(ptr)).unwrap();
        assert_eq!(pool.decrement_ref(ptr), Err(PoolError::UnknownPointer(ptr)));
        assert_eq!(pool.payload(ptr), Err(PoolError::UnknownPointer(ptr)));
    }

    #[test]
    #[should_panic(expected = "not found in allocated blocks")]
    fn strict_policy_escalates_unknown_pointer() {
        let config = PoolConfig::new(1024).with_unknown_pointer(UnknownPointerPolicy::Panic);
        let mut pool = PoolAllocator::new(config).unwrap();
        let _ = pool.increment_ref(PoolPtr::from_offset(HEADER_SIZE));
    }

    #[test]
    fn release_none_is_noop() {
        let mut pool = pool(1024);
        assert_eq!(pool.release(None), Ok(None));
    }

    #[test]
    fn unlink_from_middle_of_allocated_list() {
        let mut pool = pool(1024);
        let a = pool.allocate(8).unwrap();
        let b = pool.allocate(8).unwrap();
        let c = pool.allocate(8).unwrap();
        assert_eq!(pool.allocated_list(), vec![c, b, a]);
        pool.release(Some(b)).unwrap();
        assert_eq!(pool.allocated_list(), vec![c, a]);
        pool.release(Some(a)).unwrap();
        assert_eq!(pool.allocated_list(), vec![c]);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn reassign_moves_reference() {
        let mut pool = pool(1024);
        let a = pool.allocate(16).unwrap();
        let b = pool.allocate(16).unwrap();
        let mut slot = Some(a);
        pool.increment_ref(a).unwrap();

        pool.reassign(&mut slot, Some(b)).unwrap();
        assert_eq!(slot, Some(b));
        assert_eq!(pool.ref_count(a), Some(1));
        assert_eq!(pool.ref_count(b), Some(2));
    }

    #[test]
    fn reassign_to_self_keeps_sole_reference() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(16).unwrap();
        let mut slot = Some(ptr);
        let value = slot;
        pool.reassign(&mut slot, value).unwrap();
        assert_eq!(slot, Some(ptr));
        assert_eq!(pool.ref_count(ptr), Some(1));
        assert_eq!(pool.allocated_list(), vec![ptr]);
    }

    #[test]
    fn reassign_freed_pointer_to_itself_is_reported() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(16).unwrap();
        pool.release(Some(ptr)).unwrap();
        let mut slot = Some(ptr);
        assert_eq!(
            pool.reassign(&mut slot, Some(ptr)),
            Err(PoolError::UnknownPointer(ptr))
        );
        assert_eq!(slot, Some(ptr));
        assert_eq!(pool.stats().unknown_pointers, 1);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn reassign_to_null_drops_reference() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(16).unwrap();
        let mut slot = Some(ptr);
        pool.reassign(&mut slot, None).unwrap();
        assert_eq!(slot, None);
        assert!(!pool.is_live(ptr));
    }

    #[test]
    fn reassign_rejects_unknown_value_without_touching_slot() {
        let mut pool = pool(1024);
        let ptr = pool.allocate(16).unwrap();
        let mut slot = Some(ptr);
        let bogus = PoolPtr::from_offset(512);
        assert_eq!(
            pool.reassign(&mut slot, Some(bogus)),
            Err(PoolError::UnknownPointer(bogus))
        );
        assert_eq!(slot, Some(ptr));
        assert_eq!(pool.ref_count(ptr), Some(1));
    }

    #[test]
    fn reassign_over_stale_slot_completes() {
        let mut pool = pool(1024);
        let stale = pool.allocate(16).unwrap();
        let fresh = pool.allocate(16).unwrap();
        pool.release(Some(stale)).unwrap();
        let mut slot = Some(stale);
        pool.reassign(&mut slot, Some(fresh)).unwrap();
        assert_eq!(slot, Some(fresh));
        assert_eq!(pool.ref_count(fresh), Some(2));
    }

    #[test]
    fn teardown_is_idempotent_and_releases_once() {
        let source = LimitedSource::new(4096);
        let ledger = source.ledger();
        let mut pool = PoolAllocator::with_source(PoolConfig::new(1024), Box::new(source)).unwrap();
        let _ = pool.allocate(16).unwrap();
        pool.teardown();
        pool.teardown();
        assert!(!pool.is_alive());
        drop(pool);
        assert_eq!(ledger.reserved(), 1);
        assert_eq!(ledger.released(), 1);
    }

    #[test]
    fn metadata_survives_teardown() {
        let mut pool = pool(1024);
        let _ = pool.allocate(16).unwrap();
        pool.teardown();
        assert_eq!(pool.capacity(), 1024);
        assert_eq!(pool.config().arena_size, 1024);
        assert_eq!(pool.stats().carves, 1);
        pool.reset_stats();
        assert_eq!(pool.stats().carves, 0);
    }

    #[test]
    #[should_panic(expected = "torn-down pool")]
    fn free_bytes_after_teardown_panics() {
        let mut pool = pool(1024);
        pool.teardown();
        let _ = pool.free_bytes();
    }

    #[test]
    #[should_panic(expected = "torn-down pool")]
    fn allocate_after_teardown_panics() {
        let mut pool = pool(1024);
        pool.teardown();
        let _ = pool.allocate(16);
    }

    #[test]
    #[should_panic(expected = "torn-down pool")]
    fn reassign_after_teardown_panics() {
        let mut pool = pool(1024);
        let mut slot = pool.allocate(16);
        pool.teardown();
        let _ = pool.reassign(&mut slot, None);
    }
}
