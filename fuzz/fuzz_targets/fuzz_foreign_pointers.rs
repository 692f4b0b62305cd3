#![no_main]

use libfuzzer_sys::fuzz_target;

use refpool_memory::{PoolAllocator, PoolConfig, PoolPtr};

// Arbitrary offsets must never corrupt the pool, whatever the payloads hold.
fuzz_target!(|data: &[u8]| {
    let mut pool = PoolAllocator::new(PoolConfig::new(1024)).unwrap();
    let live: Vec<PoolPtr> = (0..4).filter_map(|_| pool.allocate(64)).collect();
    for ptr in &live {
        let payload = pool.payload_mut(*ptr).unwrap();
        for (dst, src) in payload.iter_mut().zip(data.iter().cycle()) {
            *dst = *src;
        }
    }

    for chunk in data.chunks_exact(2) {
        let offset = usize::from(u16::from_le_bytes([chunk[0], chunk[1]]));
        let ptr = PoolPtr::from_offset(offset);
        if live.contains(&ptr) {
            continue;
        }
        let _ = pool.increment_ref(ptr);
        let _ = pool.decrement_ref(ptr);
        pool.check_invariants().unwrap();
    }
});
