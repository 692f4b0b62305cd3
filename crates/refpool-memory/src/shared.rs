//! Shared pool with owning reference handles.
//!
//! [`SharedPool`] puts the allocator behind one `parking_lot::Mutex`, so each
//! call is a single critical section. [`PoolRef`] turns manual counting into
//! ownership: cloning a handle increments the block's count, dropping it
//! decrements. Only live blocks can be reached through a handle, so the
//! unknown-pointer path is unreachable from this API.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::block::PoolPtr;
use crate::error::PoolError;
use crate::pool::PoolAllocator;
use crate::stats::PoolStats;

/// Thread-safe handle to a [`PoolAllocator`].
#[derive(Clone)]
pub struct SharedPool {
    inner: Arc<Mutex<PoolAllocator>>,
}

impl SharedPool {
    /// Take ownership of `pool`.
    #[must_use]
    pub fn new(pool: PoolAllocator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    /// Allocate `size` bytes, returning the block's first reference.
    pub fn alloc(&self, size: usize) -> Option<PoolRef> {
        let ptr = self.inner.lock().allocate(size)?;
        Some(PoolRef {
            pool: Arc::clone(&self.inner),
            ptr,
        })
    }

    /// Run `f` with the allocator locked.
    pub fn with<R>(&self, f: impl FnOnce(&PoolAllocator) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Snapshot of allocator activity.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats()
    }

    /// Whether the pool can still serve requests.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.lock().is_alive()
    }

    /// Tear the pool down. Outstanding handles become inert; dropping them
    /// is a no-op, any other use panics.
    pub fn teardown(&self) {
        self.inner.lock().teardown();
    }
}

/// One counted reference to a live block.
pub struct PoolRef {
    pool: Arc<Mutex<PoolAllocator>>,
    ptr: PoolPtr,
}

impl PoolRef {
    /// Payload pointer of the referenced block.
    #[must_use]
    pub fn ptr(&self) -> PoolPtr {
        self.ptr
    }

    /// Current reference count of the block.
    #[must_use]
    pub fn ref_count(&self) -> Option<i64> {
        self.pool.lock().ref_count(self.ptr)
    }

    /// Read the payload.
    pub fn with_payload<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, PoolError> {
        let pool = self.pool.lock();
        pool.payload(self.ptr).map(f)
    }

    /// Write the payload.
    pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, PoolError> {
        let mut pool = self.pool.lock();
        pool.payload_mut(self.ptr).map(f)
    }

    /// Whether two handles reference the same block.
    #[must_use]
    pub fn same_block(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool) && self.ptr == other.ptr
    }
}

impl Clone for PoolRef {
    fn clone(&self) -> Self {
        if let Err(err) = self.pool.lock().increment_ref(self.ptr) {
            warn!(ptr = %self.ptr, %err, "failed to add reference");
        }
        Self {
            pool: Arc::clone(&self.pool),
            ptr: self.ptr,
        }
    }
}

impl Drop for PoolRef {
    fn drop(&mut self) {
        let mut pool = self.pool.lock();
        if !pool.is_alive() {
            return;
        }
        if let Err(err) = pool.decrement_ref(self.ptr) {
            warn!(ptr = %self.ptr, %err, "failed to drop reference");
        }
    }
}

impl fmt::Debug for PoolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRef").field("ptr", &self.ptr).finish()
    }
}
