//! refpool library: demonstration client logic for the pool allocator.

pub mod app;
pub mod config;
pub mod errors;
