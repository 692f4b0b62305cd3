#![no_main]

use libfuzzer_sys::fuzz_target;

use refpool_memory::{PoolAllocator, PoolConfig, PoolPtr};

// Each 3-byte chunk is one operation: opcode, operand, operand.
fuzz_target!(|data: &[u8]| {
    let mut pool = PoolAllocator::new(PoolConfig::new(4096)).unwrap();
    let mut slots: Vec<Option<PoolPtr>> = Vec::new();

    for chunk in data.chunks_exact(3) {
        let (op, x, y) = (chunk[0] % 4, usize::from(chunk[1]), usize::from(chunk[2]));
        match op {
            0 => {
                if let Some(ptr) = pool.allocate(x * 4 + y % 4) {
                    slots.push(Some(ptr));
                }
            }
            1 if !slots.is_empty() => {
                if let Some(ptr) = slots[x % slots.len()] {
                    pool.increment_ref(ptr).unwrap();
                    slots.push(Some(ptr));
                }
            }
            2 if !slots.is_empty() => {
                let slot = slots.swap_remove(x % slots.len());
                pool.release(slot).unwrap();
            }
            3 if !slots.is_empty() => {
                let i = x % slots.len();
                let value = if y % 5 == 0 { None } else { slots[y % slots.len()] };
                let mut slot = slots[i];
                pool.reassign(&mut slot, value).unwrap();
                slots[i] = slot;
            }
            _ => {}
        }
        pool.check_invariants().unwrap();
    }

    for slot in slots {
        pool.release(slot).unwrap();
    }
    assert_eq!(pool.allocated_count(), 0);
});
