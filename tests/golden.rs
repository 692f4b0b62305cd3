//! Golden file integration tests.
//!
//! Reads tests/testdata/pool_golden.json and replays each trace, checking
//! the pointers handed out and the final block layout.

use std::collections::HashMap;

use serde::Deserialize;

use refpool_tests::memory::{BlockLocation, PoolAllocator, PoolConfig, PoolPtr};

// ---------------------------------------------------------------------------
// Golden data structures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GoldenData {
    #[allow(dead_code)]
    description: String,
    traces: Vec<Trace>,
}

#[derive(Deserialize)]
struct Trace {
    name: String,
    arena_size: usize,
    steps: Vec<Step>,
    layout: Vec<LayoutEntry>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Allocate {
        name: String,
        size: usize,
        expect: Option<usize>,
    },
    Release {
        name: String,
        expect_count: i64,
    },
    Reassign {
        slot: String,
        value: Option<String>,
        expect_count: Option<i64>,
    },
}

#[derive(Deserialize)]
struct LayoutEntry {
    offset: usize,
    size: usize,
    location: String,
}

fn load_golden() -> GoldenData {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/testdata/pool_golden.json");
    let data = std::fs::read_to_string(path).expect("failed to read golden file");
    serde_json::from_str(&data).expect("failed to parse golden file")
}

fn location_name(location: BlockLocation) -> &'static str {
    match location {
        BlockLocation::Free => "free",
        BlockLocation::Allocated => "allocated",
        BlockLocation::Unlisted => "unlisted",
    }
}

fn replay(trace: &Trace) {
    let mut pool = PoolAllocator::new(PoolConfig::new(trace.arena_size)).unwrap();
    let mut slots: HashMap<String, Option<PoolPtr>> = HashMap::new();

    for (i, step) in trace.steps.iter().enumerate() {
        let ctx = format!("{} step {i}", trace.name);
        match step {
            Step::Allocate { name, size, expect } => {
                let ptr = pool.allocate(*size);
                assert_eq!(ptr.map(PoolPtr::offset), *expect, "{ctx}: allocate {name}");
                slots.insert(name.clone(), ptr);
            }
            Step::Release { name, expect_count } => {
                let ptr = slots.get(name).copied().flatten();
                pool.release(ptr).unwrap();
                let count = ptr.and_then(|p| pool.ref_count(p)).unwrap_or(0);
                assert_eq!(count, *expect_count, "{ctx}: release {name}");
            }
            Step::Reassign {
                slot,
                value,
                expect_count,
            } => {
                let target = value.as_ref().and_then(|v| slots.get(v).copied().flatten());
                let mut current = slots.get(slot).copied().flatten();
                pool.reassign(&mut current, target).unwrap();
                slots.insert(slot.clone(), current);
                if let Some(expected) = expect_count {
                    let count = target.and_then(|p| pool.ref_count(p));
                    assert_eq!(count, Some(*expected), "{ctx}: reassign {slot}");
                }
            }
        }
        pool.check_invariants()
            .unwrap_or_else(|e| panic!("{ctx}: {e}"));
    }

    let layout: Vec<(usize, usize, &str)> = pool
        .blocks()
        .iter()
        .map(|b| (b.offset, b.size, location_name(b.location)))
        .collect();
    let expected: Vec<(usize, usize, &str)> = trace
        .layout
        .iter()
        .map(|e| (e.offset, e.size, e.location.as_str()))
        .collect();
    assert_eq!(layout, expected, "{}: final layout", trace.name);
}

#[test]
fn golden_traces() {
    let data = load_golden();
    assert!(!data.traces.is_empty());
    for trace in &data.traces {
        replay(trace);
    }
}
