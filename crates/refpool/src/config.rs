//! Application configuration from CLI flags and environment.

use clap::Parser;

use refpool_memory::constants::DEFAULT_ARENA_SIZE;
use refpool_memory::{PoolConfig, UnknownPointerPolicy};

/// refpool: reference-counted pool allocator demonstration client.
///
/// Reads an integer array (count first, then values) from stdin unless
/// `--values` is given, stores it in a block carved from the pool, and prints
/// it back through the block's payload.
#[derive(Parser, Debug)]
#[command(name = "refpool", version, about)]
pub struct AppConfig {
    /// Arena size in bytes.
    #[arg(short = 's', long, default_value_t = DEFAULT_ARENA_SIZE, env = "REFPOOL_ARENA_SIZE")]
    pub arena_size: usize,

    /// Integer values to store, comma-separated (skips the stdin prompt).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub values: Option<Vec<i32>>,

    /// Run the reference-transfer walkthrough instead of the array demo.
    #[arg(long)]
    pub scenario: bool,

    /// Print allocator statistics as JSON when done.
    #[arg(long)]
    pub json: bool,

    /// Treat reference-count calls on unknown pointers as fatal.
    #[arg(long)]
    pub strict: bool,

    /// Verbose output (logs every allocator decision).
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (only output the values).
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate shell completion.
    #[arg(long, value_enum)]
    pub completion: Option<clap_complete::Shell>,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Pool settings derived from the flags.
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        let policy = if self.strict {
            UnknownPointerPolicy::Panic
        } else {
            UnknownPointerPolicy::Report
        };
        PoolConfig::new(self.arena_size).with_unknown_pointer(policy)
    }
}
