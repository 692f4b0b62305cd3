//! Application entry point and dispatch.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use refpool_memory::{PoolAllocator, PoolConfig, PoolStats, RefRelease};

use crate::config::AppConfig;
use crate::errors::InputError;

const INT_SIZE: usize = std::mem::size_of::<i32>();

/// Arena used by the reference-transfer walkthrough.
pub const SCENARIO_ARENA_SIZE: usize = 1024;

/// Run the application against the process's stdin and stdout.
pub fn run(config: &AppConfig) -> Result<()> {
    // Handle shell completion
    if let Some(shell) = config.completion {
        let mut cmd = <AppConfig as clap::CommandFactory>::command();
        clap_complete::generate(shell, &mut cmd, "refpool", &mut std::io::stdout());
        return Ok(());
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_with(config, &mut stdin.lock(), &mut stdout.lock())
}

/// Run the application with explicit input and output streams.
pub fn run_with(config: &AppConfig, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
    let stats = if config.scenario {
        run_scenario(config, out)?
    } else {
        run_array(config, input, out)?
    };

    if config.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
    }
    Ok(())
}

fn run_array(config: &AppConfig, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<PoolStats> {
    let mut pool = PoolAllocator::new(config.pool_config()).context("initializing memory pool")?;

    let values = match &config.values {
        Some(values) => values.clone(),
        None => read_values(input, !config.quiet)?,
    };
    let bytes = values
        .len()
        .checked_mul(INT_SIZE)
        .ok_or(InputError::TooLarge(values.len()))?;

    let ptr = pool
        .try_allocate(bytes)
        .context("memory allocation failed")?;
    if !config.quiet {
        writeln!(out, "Memory allocated for integer array at {ptr}")?;
    }

    for (slot, value) in pool.payload_mut(ptr)?.chunks_exact_mut(INT_SIZE).zip(&values) {
        slot.copy_from_slice(&value.to_le_bytes());
    }

    let stored: Vec<i32> = pool
        .payload(ptr)?
        .chunks_exact(INT_SIZE)
        .take(values.len())
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if config.quiet {
        for value in &stored {
            writeln!(out, "{value}")?;
        }
    } else {
        writeln!(out, "The values in the array are:")?;
        for (i, value) in stored.iter().enumerate() {
            writeln!(out, "Value at index {i}: {value}")?;
        }
    }

    pool.release(Some(ptr))?;
    if !config.quiet {
        writeln!(out, "Memory freed")?;
    }

    let stats = pool.stats();
    pool.teardown();
    Ok(stats)
}

/// Walk the aliasing sequence: two allocations, a reassigned alias, two
/// releases, and a reallocation that lands on the reclaimed block.
fn run_scenario(config: &AppConfig, out: &mut dyn Write) -> Result<PoolStats> {
    let mut pool = PoolAllocator::new(PoolConfig {
        arena_size: SCENARIO_ARENA_SIZE,
        ..config.pool_config()
    })?;
    writeln!(out, "reserved {}-byte arena", pool.capacity())?;

    let a = pool.try_allocate(16)?;
    writeln!(out, "allocate A (16 bytes) -> {a}")?;
    let b = pool.try_allocate(16)?;
    writeln!(out, "allocate B (16 bytes) -> {b}")?;

    let mut c = None;
    pool.reassign(&mut c, Some(a))?;
    writeln!(
        out,
        "reassign C <- A -> ref_count(A) = {}",
        pool.ref_count(a).unwrap_or(0)
    )?;

    describe_release(out, "A", a, pool.release(Some(a))?)?;
    if let Some(c) = c {
        describe_release(out, "C", c, pool.release(Some(c))?)?;
    }

    let d = pool.try_allocate(16)?;
    writeln!(out, "allocate 16 bytes -> {d} (reused A: {})", d == a)?;

    pool.check_invariants()?;
    let stats = pool.stats();
    pool.teardown();
    Ok(stats)
}

fn describe_release(
    out: &mut dyn Write,
    name: &str,
    ptr: refpool_memory::PoolPtr,
    outcome: Option<RefRelease>,
) -> Result<()> {
    match outcome {
        Some(RefRelease::Retained(count)) => {
            writeln!(out, "release {name} -> ref_count = {count}")?;
        }
        Some(RefRelease::Reclaimed) => writeln!(out, "release {name} -> block {ptr} reclaimed")?,
        None => writeln!(out, "release {name} -> nothing to release")?,
    }
    Ok(())
}

/// Whitespace-separated tokens pulled from `input` a line at a time.
struct Tokens<'a> {
    input: &'a mut dyn BufRead,
    pending: VecDeque<String>,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a mut dyn BufRead) -> Self {
        Self {
            input,
            pending: VecDeque::new(),
        }
    }

    fn next_token(&mut self) -> Result<Option<String>, InputError> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_owned));
        }
        Ok(self.pending.pop_front())
    }
}

/// Write `message` to stderr when running interactively.
fn prompt(enabled: bool, message: &str) -> std::io::Result<()> {
    if enabled {
        let mut err = std::io::stderr().lock();
        write!(err, "{message}")?;
        err.flush()?;
    }
    Ok(())
}

/// Read an element count followed by that many integers.
fn read_values(input: &mut dyn BufRead, interactive: bool) -> Result<Vec<i32>, InputError> {
    let mut tokens = Tokens::new(input);

    prompt(interactive, "Enter the size of the integer array: ")?;
    let count_token = tokens.next_token()?.ok_or(InputError::MissingCount)?;
    let count: usize = count_token
        .parse()
        .map_err(|_| InputError::NotAnInteger(count_token.clone()))?;

    prompt(interactive, &format!("Enter {count} integers:\n"))?;
    let mut values = Vec::new();
    for i in 0..count {
        prompt(interactive, &format!("Enter integer {}: ", i + 1))?;
        let Some(token) = tokens.next_token()? else {
            return Err(InputError::Truncated {
                expected: count,
                got: values.len(),
            });
        };
        let value = token
            .parse()
            .map_err(|_| InputError::NotAnInteger(token.clone()))?;
        values.push(value);
    }
    Ok(values)
}
