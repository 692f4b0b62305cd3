//! Error handling and exit codes.

use refpool_memory::PoolError;

/// Exit codes reported by the binary.
pub mod exit_codes {
    /// Any failure without a more specific code.
    pub const ERROR_GENERIC: u8 = 1;
    /// The arena could not be reserved.
    pub const ERROR_ARENA: u8 = 2;
    /// The pool could not satisfy an allocation.
    pub const ERROR_OUT_OF_SPACE: u8 = 3;
    /// Malformed input.
    pub const ERROR_INPUT: u8 = 4;
}

/// Malformed array input.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// No element count was supplied.
    #[error("expected the array size")]
    MissingCount,

    /// A token was not an integer.
    #[error("not an integer: {0:?}")]
    NotAnInteger(String),

    /// Fewer values than announced.
    #[error("expected {expected} integers, got {got}")]
    Truncated {
        /// Announced element count.
        expected: usize,
        /// Values actually read.
        got: usize,
    },

    /// The array does not fit in addressable memory.
    #[error("array of {0} integers is too large")]
    TooLarge(usize),

    /// Reading stdin failed.
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Map a pool error to its exit code.
pub fn handle_error(err: &PoolError) -> u8 {
    match err {
        PoolError::ArenaUnavailable { .. } | PoolError::ArenaTooSmall { .. } => {
            exit_codes::ERROR_ARENA
        }
        PoolError::OutOfPoolSpace { .. } | PoolError::ZeroSizeRequest => {
            exit_codes::ERROR_OUT_OF_SPACE
        }
        PoolError::UnknownPointer(_) | PoolError::Corrupted(_) => exit_codes::ERROR_GENERIC,
    }
}

/// Exit code for any application error.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(pool) = err.downcast_ref::<PoolError>() {
        handle_error(pool)
    } else if err.downcast_ref::<InputError>().is_some() {
        exit_codes::ERROR_INPUT
    } else {
        exit_codes::ERROR_GENERIC
    }
}
