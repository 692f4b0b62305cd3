//! Fixed-size backing arena.
//!
//! The arena is reserved once from a [`MemorySource`] and handed back exactly
//! once. It knows nothing about blocks; the pool lays headers over its bytes.

use tracing::{debug, info};

use crate::error::PoolError;
use crate::source::{HeapSource, MemorySource};

/// One contiguous, zero-initialized byte region.
pub struct Arena {
    region: Option<Box<[u8]>>,
    source: Box<dyn MemorySource>,
}

impl Arena {
    /// Create an unreserved arena drawing from `source`.
    #[must_use]
    pub fn new(source: Box<dyn MemorySource>) -> Self {
        Self {
            region: None,
            source,
        }
    }

    /// Reserve `size` bytes. A no-op if the arena is already reserved.
    pub fn reserve(&mut self, size: usize) -> Result<(), PoolError> {
        if let Some(region) = &self.region {
            debug!(size = region.len(), "arena already reserved");
            return Ok(());
        }
        let region = self.source.reserve(size)?;
        info!(size, "arena reserved");
        self.region = Some(region);
        Ok(())
    }

    /// Hand the region back to its source. A no-op if not reserved.
    pub fn release(&mut self) {
        if let Some(region) = self.region.take() {
            let size = region.len();
            self.source.release(region);
            info!(size, "arena released");
        }
    }

    /// Whether a region is currently held.
    #[inline]
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.region.is_some()
    }

    /// Size of the held region in bytes, or zero.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.region.as_ref().map_or(0, |region| region.len())
    }

    /// The arena bytes. Empty when not reserved.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.region.as_deref().unwrap_or(&[])
    }

    /// Mutable arena bytes. Empty when not reserved.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.region.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(Box::new(HeapSource))
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LimitedSource;

    #[test]
    fn reserve_yields_zeroed_region() {
        let mut arena = Arena::default();
        arena.reserve(1024).unwrap();
        assert!(arena.is_reserved());
        assert_eq!(arena.size(), 1024);
        assert!(arena.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn reserve_is_idempotent() {
        let source = LimitedSource::new(4096);
        let ledger = source.ledger();
        let mut arena = Arena::new(Box::new(source));
        arena.reserve(1024).unwrap();
        arena.bytes_mut()[0] = 7;
        arena.reserve(2048).unwrap();
        assert_eq!(arena.size(), 1024);
        assert_eq!(arena.bytes()[0], 7);
        assert_eq!(ledger.reserved(), 1);
    }

    #[test]
    fn denied_reservation_propagates() {
        let mut arena = Arena::new(Box::new(LimitedSource::new(64)));
        assert_eq!(
            arena.reserve(65),
            Err(PoolError::ArenaUnavailable { requested: 65 })
        );
        assert!(!arena.is_reserved());
    }

    #[test]
    fn release_hands_region_back_once() {
        let source = LimitedSource::new(4096);
        let ledger = source.ledger();
        let mut arena = Arena::new(Box::new(source));
        arena.reserve(512).unwrap();
        arena.release();
        arena.release();
        drop(arena);
        assert_eq!(ledger.released(), 1);
    }

    #[test]
    fn release_without_reserve_is_noop() {
        let source = LimitedSource::new(4096);
        let ledger = source.ledger();
        let mut arena = Arena::new(Box::new(source));
        arena.release();
        assert_eq!(arena.size(), 0);
        assert!(arena.bytes().is_empty());
        assert_eq!(ledger.released(), 0);
    }

    #[test]
    fn drop_releases_reserved_region() {
        let source = LimitedSource::new(4096);
        let ledger = source.ledger();
        {
            let mut arena = Arena::new(Box::new(source));
            arena.reserve(256).unwrap();
        }
        assert_eq!(ledger.released(), 1);
    }
}
