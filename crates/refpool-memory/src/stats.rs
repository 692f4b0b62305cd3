//! Atomic counters for allocator decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of pool activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Allocations satisfied by a recycled free block.
    pub reuses: u64,
    /// Allocations carved from never-used arena space.
    pub carves: u64,
    /// Free blocks split to satisfy an allocation.
    pub splits: u64,
    /// Blocks returned to the free list after their count reached zero.
    pub reclaims: u64,
    /// Allocations refused for lack of space.
    pub failed_allocations: u64,
    /// Reference-count operations on pointers absent from the allocated list.
    pub unknown_pointers: u64,
}

/// Atomic pool statistics, updated through `&self`.
#[derive(Debug, Default)]
pub struct AtomicPoolStats {
    reuses: AtomicU64,
    carves: AtomicU64,
    splits: AtomicU64,
    reclaims: AtomicU64,
    failed_allocations: AtomicU64,
    unknown_pointers: AtomicU64,
}

impl AtomicPoolStats {
    /// Create new zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of current stats.
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            reuses: self.reuses.load(Ordering::Relaxed),
            carves: self.carves.load(Ordering::Relaxed),
            splits: self.splits.load(Ordering::Relaxed),
            reclaims: self.reclaims.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
            unknown_pointers: self.unknown_pointers.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.reuses,
            &self.carves,
            &self.splits,
            &self.reclaims,
            &self.failed_allocations,
            &self.unknown_pointers,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_reuse(&self) {
        self.reuses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_carve(&self) {
        self.carves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reclaim(&self) {
        self.reclaims.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_allocation(&self) {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unknown_pointer(&self) {
        self.unknown_pointers.fetch_add(1, Ordering::Relaxed);
    }
}
