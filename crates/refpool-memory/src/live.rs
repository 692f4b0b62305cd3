//! Bitmap of live payload offsets.
//!
//! One bit per aligned arena offset. A set bit means a block in the
//! allocated list has its payload starting there, so pointer validation is a
//! single bit test instead of a list walk, and client bytes are never trusted
//! as headers.

use crate::constants::ALIGNMENT;

const WORD_BITS: usize = 64;

pub(crate) struct LiveMap {
    words: Box<[u64]>,
    slots: usize,
}

impl LiveMap {
    pub(crate) fn new(arena_size: usize) -> Self {
        let slots = arena_size / ALIGNMENT + 1;
        Self {
            words: vec![0u64; slots.div_ceil(WORD_BITS)].into_boxed_slice(),
            slots,
        }
    }

    fn slot(&self, offset: usize) -> Option<(usize, u64)> {
        if offset % ALIGNMENT != 0 {
            return None;
        }
        let slot = offset / ALIGNMENT;
        (slot < self.slots).then(|| (slot / WORD_BITS, 1u64 << (slot % WORD_BITS)))
    }

    pub(crate) fn contains(&self, offset: usize) -> bool {
        self.slot(offset)
            .is_some_and(|(word, mask)| self.words[word] & mask != 0)
    }

    pub(crate) fn insert(&mut self, offset: usize) {
        if let Some((word, mask)) = self.slot(offset) {
            self.words[word] |= mask;
        }
    }

    pub(crate) fn remove(&mut self, offset: usize) {
        if let Some((word, mask)) = self.slot(offset) {
            self.words[word] &= !mask;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.words.fill(0);
    }
}
