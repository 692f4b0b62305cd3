//! Pool configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_ARENA_SIZE;

/// What to do when a reference-count operation names a pointer that is not
/// in the allocated list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPointerPolicy {
    /// Log a warning and return [`PoolError::UnknownPointer`](crate::PoolError::UnknownPointer).
    #[default]
    Report,
    /// Treat the call as a fatal programming error and panic.
    Panic,
}

/// Settings fixed for the lifetime of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Arena size in bytes, header overhead included.
    pub arena_size: usize,
    /// Handling of unknown pointers.
    #[serde(default)]
    pub unknown_pointer: UnknownPointerPolicy,
}

impl PoolConfig {
    /// Configuration for an arena of `arena_size` bytes.
    #[must_use]
    pub const fn new(arena_size: usize) -> Self {
        Self {
            arena_size,
            unknown_pointer: UnknownPointerPolicy::Report,
        }
    }

    /// Replace the unknown-pointer policy.
    #[must_use]
    pub const fn with_unknown_pointer(mut self, policy: UnknownPointerPolicy) -> Self {
        self.unknown_pointer = policy;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_SIZE)
    }
}
