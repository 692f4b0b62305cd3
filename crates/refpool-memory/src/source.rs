//! Backing memory sources for the arena.
//!
//! A [`MemorySource`] is the only thing the allocator asks of its
//! environment: a zeroed, read-write region of a given size, and a place to
//! hand it back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::PoolError;

/// Grants and takes back the arena's backing region.
pub trait MemorySource: Send {
    /// Reserve `size` zero-filled bytes.
    fn reserve(&mut self, size: usize) -> Result<Box<[u8]>, PoolError>;

    /// Give a region obtained from [`reserve`](Self::reserve) back.
    fn release(&mut self, region: Box<[u8]>);
}

/// Reserves arenas from the process heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapSource;

impl MemorySource for HeapSource {
    fn reserve(&mut self, size: usize) -> Result<Box<[u8]>, PoolError> {
        if size == 0 {
            return Err(PoolError::ArenaUnavailable { requested: 0 });
        }
        let mut region = Vec::new();
        region
            .try_reserve_exact(size)
            .map_err(|_| PoolError::ArenaUnavailable { requested: size })?;
        region.resize(size, 0);
        Ok(region.into_boxed_slice())
    }

    fn release(&mut self, region: Box<[u8]>) {
        drop(region);
    }
}

/// Reservation and release counts shared between a [`LimitedSource`] and
/// whoever inspects it.
#[derive(Debug, Default)]
pub struct SourceLedger {
    reserved: AtomicUsize,
    released: AtomicUsize,
}

impl SourceLedger {
    /// Number of successful reservations.
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }

    /// Number of regions handed back.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }
}

/// Heap source that refuses any request above a fixed byte limit.
#[derive(Debug)]
pub struct LimitedSource {
    limit: usize,
    ledger: Arc<SourceLedger>,
}

impl LimitedSource {
    /// Create a source granting at most `limit` bytes per reservation.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ledger: Arc::new(SourceLedger::default()),
        }
    }

    /// Shared handle to the reservation counters.
    #[must_use]
    pub fn ledger(&self) -> Arc<SourceLedger> {
        Arc::clone(&self.ledger)
    }
}

impl MemorySource for LimitedSource {
    fn reserve(&mut self, size: usize) -> Result<Box<[u8]>, PoolError> {
        if size > self.limit {
            return Err(PoolError::ArenaUnavailable { requested: size });
        }
        let region = HeapSource.reserve(size)?;
        self.ledger.reserved.fetch_add(1, Ordering::Relaxed);
        Ok(region)
    }

    fn release(&mut self, region: Box<[u8]>) {
        self.ledger.released.fetch_add(1, Ordering::Relaxed);
        drop(region);
    }
}
