//! Cache Array: a fixed-size, direct-mapped array of `CacheSlot`s.
//!
//! No associativity and no replacement search — a request for a block
//! whose slot currently holds a different block simply bypasses the
//! cache. This is deliberate: the point of the cache is to produce
//! reproducible data-loss patterns, not to maximize hit rate.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use crate::slot::{CacheSlot, SlotSnapshot};

pub struct CacheArray {
    slots: Vec<CacheSlot>,
}

impl CacheArray {
    pub fn new(slot_count: u16, block_size: u32) -> Self {
        let slots = (0..slot_count as usize)
            .map(|index| CacheSlot::new(index, block_size))
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `slot index = block_number mod N`.
    pub fn slot_for(&self, block_number: u64) -> &CacheSlot {
        let index = (block_number % self.slots.len() as u64) as usize;
        &self.slots[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheSlot> {
        self.slots.iter()
    }

    /// Render the `cache` admin key: one line per non-`Empty` slot,
    /// `<index> <STATE> <waiters> <sector>`, truncated with `...\n` past
    /// `max_lines`. `sector_shift` converts a resident block number to
    /// its first sector (0 for 512-byte blocks, 3 for 4096-byte blocks).
    pub fn render_cache_listing(&self, max_lines: usize, sector_shift: u32) -> String {
        let mut out = String::new();
        let mut emitted = 0usize;
        for slot in &self.slots {
            let SlotSnapshot {
                index,
                state,
                waiters,
                block_number,
            } = slot.snapshot();
            if state == crate::slot::SlotState::Empty {
                continue;
            }
            if emitted == max_lines {
                out.push_str("...\n");
                break;
            }
            let sector = block_number << sector_shift;
            let _ = writeln!(out, "{index} {} {waiters} {sector}", state.as_str());
            emitted += 1;
        }
        out
    }
}
