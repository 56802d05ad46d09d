//! The simulated heap: a fixed-size backing buffer, the block list covering
//! it end-to-end, an O(1) allocation index, and the four placement
//! policies' shared entry point.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::align::align_up;
use crate::block::Block;
use crate::error::HeapError;
use crate::policy::{self, Strategy};
use crate::root_set::RootSet;

/// A simulated heap backed by a fixed-size byte buffer.
///
/// `blocks` always tiles `[0, heap_size)` exactly: `blocks[0].start() == 0`,
/// each block's end is the next block's start, and the sizes sum to
/// `heap_size`. `allocations` maps every currently-allocated block's start
/// address to its index in `blocks`, so lookup by address is O(1); indices
/// are kept in sync across every insertion/removal the block list
/// undergoes (see `insert_block`/`remove_block`).
pub struct Heap {
    buffer: Vec<u8>,
    blocks: Vec<Block>,
    allocations: HashMap<usize, usize>,
    strategy: Strategy,
    last_allocation_index: usize,
    root_set: RootSet,
}

impl Heap {
    /// Creates a heap of `heap_size` bytes, covered by a single free block.
    ///
    /// # Panics
    ///
    /// Panics if `heap_size` is zero — a heap must cover a positive number
    /// of bytes per the data model's invariant that every block size is
    /// strictly positive.
    pub fn new(heap_size: usize) -> Self {
        assert!(heap_size > 0, "heap_size must be positive");
        Self {
            buffer: vec![0u8; heap_size],
            blocks: vec![Block::new(0, heap_size, true)],
            allocations: HashMap::new(),
            strategy: Strategy::default(),
            last_allocation_index: 0,
            root_set: RootSet::new(),
        }
    }

    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn heap_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Crate-private: used by [`crate::collector::Collector`] to clear
    /// `marked` on every block after a sweep.
    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn root_set(&self) -> &RootSet {
        &self.root_set
    }

    pub fn root_set_mut(&mut self) -> &mut RootSet {
        &mut self.root_set
    }

    /// Looks up the block starting exactly at `start`, whether free or
    /// allocated.
    pub fn find_block(&self, start: usize) -> Option<&Block> {
        self.blocks.iter().find(|b| b.start() == start)
    }

    /// Mutable counterpart of [`Heap::find_block`], used to reach
    /// `Block::add_reference`/`remove_reference` on an allocated block's
    /// start address.
    pub fn find_block_mut(&mut self, start: usize) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.start() == start)
    }

    /// Read-only view over the currently-allocated blocks, keyed by their
    /// start address.
    pub fn allocations(&self) -> impl Iterator<Item = (usize, &Block)> {
        self.allocations
            .iter()
            .map(move |(&addr, &idx)| (addr, &self.blocks[idx]))
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Inserts `block` at `pos` in the block list, keeping `allocations` and
    /// `last_allocation_index` consistent with the shift this causes.
    fn insert_block(&mut self, pos: usize, block: Block) {
        self.blocks.insert(pos, block);
        for idx in self.allocations.values_mut() {
            if *idx >= pos {
                *idx += 1;
            }
        }
        if self.last_allocation_index >= pos {
            self.last_allocation_index += 1;
        }
    }

    /// Removes the block at `pos` (which must not be present in
    /// `allocations` — callers remove it from the map first), keeping
    /// `allocations` and `last_allocation_index` consistent with the shift
    /// this causes.
    fn remove_block(&mut self, pos: usize) {
        self.blocks.remove(pos);
        for idx in self.allocations.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        if self.last_allocation_index > pos {
            self.last_allocation_index -= 1;
        }
        if self.last_allocation_index >= self.blocks.len() {
            self.last_allocation_index = 0;
        }
    }

    /// Allocates `size` bytes, returning the aligned start address of the
    /// new allocation, or `None` if no free block can accommodate the
    /// request after alignment padding.
    ///
    /// ```text
    ///   1. policy picks a free block of size >= request
    ///   2. padding: carve a free prefix off the front so the chosen
    ///      block's (new) start is a multiple of ALIGNMENT
    ///   3. split: if the (now padded) chosen block is still larger than
    ///      the request, carve a free remainder off the back
    ///   4. finalise: mark allocated, index it, re-anchor the next-fit
    ///      cursor to its position
    /// ```
    ///
    /// A policy that selects a block whose size, after padding is deducted,
    /// falls below `size` causes the whole call to fail — other blocks are
    /// not tried.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 {
            // A zero-size block would violate the invariant that every
            // block has a strictly positive size.
            warn!("allocate(0) rejected");
            return None;
        }
        let idx = policy::select(&self.blocks, size, self.strategy, self.last_allocation_index)?;
        trace!(strategy = ?self.strategy, size, block_start = self.blocks[idx].start(), "policy selected block");

        let block_start = self.blocks[idx].start();
        let block_size = self.blocks[idx].size();
        let aligned_start = align_up(block_start);
        let padding = aligned_start - block_start;

        if block_size < padding + size {
            warn!(block_start, block_size, padding, size, "selected block insufficient after alignment padding");
            return None;
        }

        let mut idx = idx;
        if padding > 0 {
            debug!(block_start, padding, "carving alignment padding prefix");
            let padding_block = Block::new(block_start, padding, true);
            self.blocks[idx].set_start(aligned_start);
            self.blocks[idx].set_size(block_size - padding);
            self.insert_block(idx, padding_block);
            idx += 1;
        }

        let remaining = self.blocks[idx].size() - size;
        if remaining > 0 {
            let remainder_start = self.blocks[idx].start() + size;
            debug!(remainder_start, remaining, "splitting remainder free block");
            let remainder_block = Block::new(remainder_start, remaining, true);
            self.blocks[idx].set_size(size);
            self.insert_block(idx + 1, remainder_block);
        }

        self.blocks[idx].set_free(false);
        let start = self.blocks[idx].start();
        self.allocations.insert(start, idx);
        self.last_allocation_index = idx;

        debug!(address = start, size, "allocated");
        #[cfg(debug_assertions)]
        self.debug_assert_invariants();
        Some(start)
    }

    /// Frees the allocation starting at `address`, then coalesces with a
    /// free successor and/or predecessor.
    ///
    /// Fails with [`HeapError::InvalidFree`] if `address` is not currently
    /// the start of an allocated block (never allocated, already freed, or
    /// not a valid start address).
    pub fn free(&mut self, address: usize) -> Result<(), HeapError> {
        let Some(idx) = self.allocations.remove(&address) else {
            warn!(address, "invalid free");
            return Err(HeapError::InvalidFree { address });
        };

        self.blocks[idx].set_free(true);
        trace!(address, "freed, coalescing neighbours");

        if idx + 1 < self.blocks.len() && self.blocks[idx + 1].is_free() {
            let merged = self.blocks[idx].size() + self.blocks[idx + 1].size();
            self.blocks[idx].set_size(merged);
            self.remove_block(idx + 1);
            debug!(address, merged_with = "successor", new_size = merged, "coalesced");
        }

        if idx > 0 && self.blocks[idx - 1].is_free() {
            let merged = self.blocks[idx - 1].size() + self.blocks[idx].size();
            self.blocks[idx - 1].set_size(merged);
            self.remove_block(idx);
            debug!(address, merged_with = "predecessor", new_size = merged, "coalesced");
        }

        #[cfg(debug_assertions)]
        self.debug_assert_invariants();
        Ok(())
    }

    fn locate_allocated(&self, address: usize) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| !b.is_free() && b.contains(address))
    }

    /// Reads the byte at `address`.
    ///
    /// Fails with [`HeapError::InvalidAccess`] if `address` does not lie
    /// within any currently-allocated block.
    pub fn read(&self, address: usize) -> Result<u8, HeapError> {
        match self.locate_allocated(address) {
            Some(_) => Ok(self.buffer[address]),
            None => {
                warn!(address, "invalid read");
                Err(HeapError::InvalidAccess { address })
            }
        }
    }

    /// Writes `value` to `address`.
    ///
    /// Fails with [`HeapError::InvalidAccess`] if `address` does not lie
    /// within any currently-allocated block.
    pub fn write(&mut self, address: usize, value: u8) -> Result<(), HeapError> {
        match self.locate_allocated(address) {
            Some(_) => {
                self.buffer[address] = value;
                Ok(())
            }
            None => {
                warn!(address, "invalid write");
                Err(HeapError::InvalidAccess { address })
            }
        }
    }

    /// Re-validates the global invariants: tiling, positive sizes, the
    /// allocation map's key set, and no two adjacent free blocks. Debug-only
    /// self-check, not part of the public contract.
    #[cfg(debug_assertions)]
    pub(crate) fn debug_assert_invariants(&self) {
        assert_eq!(self.blocks[0].start(), 0);
        let mut expected_start = 0usize;
        for (i, b) in self.blocks.iter().enumerate() {
            assert!(b.size() > 0, "block {i} has non-positive size");
            assert_eq!(b.start(), expected_start, "block {i} does not tile contiguously");
            expected_start += b.size();
            if i > 0 {
                assert!(
                    !(self.blocks[i - 1].is_free() && b.is_free()),
                    "adjacent free blocks at {i}"
                );
            }
        }
        assert_eq!(expected_start, self.heap_size());

        let expected: std::collections::HashSet<usize> = self
            .blocks
            .iter()
            .filter(|b| !b.is_free())
            .map(|b| b.start())
            .collect();
        let actual: std::collections::HashSet<usize> = self.allocations.keys().copied().collect();
        assert_eq!(expected, actual, "allocations key set mismatch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_round_trip() {
        let mut h = Heap::new(64);
        let p = h.allocate(16).unwrap();
        assert_eq!(p, 0);
        h.write(0, 42).unwrap();
        assert_eq!(h.read(0).unwrap(), 42);
        h.free(0).unwrap();
        assert!(matches!(h.read(0), Err(HeapError::InvalidAccess { address: 0 })));
    }

    #[test]
    fn alignment_of_fresh_heap_allocations() {
        for s in 1..=32usize {
            let mut h = Heap::new(128);
            let p1 = h.allocate(s).unwrap();
            assert_eq!(p1, 0);
            let p2 = h.allocate(1).unwrap();
            assert_eq!(p2 % 8, 0, "size {s} produced misaligned second address {p2}");
        }
    }

    #[test]
    fn first_fit_reuses_freed_block() {
        let mut h = Heap::new(128);
        h.set_strategy(Strategy::FirstFit);
        let p1 = h.allocate(32).unwrap();
        let _p2 = h.allocate(32).unwrap();
        let p3 = h.allocate(32).unwrap();
        h.free(p1).unwrap();
        h.free(p3).unwrap();
        let p4 = h.allocate(16).unwrap();
        assert_eq!(p4, p1);
        assert_eq!(p4, 0);
    }

    #[test]
    fn best_fit_chooses_smallest_sufficient_freed_block() {
        let mut h = Heap::new(128);
        h.set_strategy(Strategy::BestFit);
        let p1 = h.allocate(16).unwrap();
        let p2 = h.allocate(32).unwrap();
        let _p3 = h.allocate(8).unwrap();
        h.free(p1).unwrap();
        h.free(p2).unwrap();
        let p4 = h.allocate(16).unwrap();
        assert_eq!(p4, p1);
        assert_eq!(p4, 0);
    }

    #[test]
    fn coalescing_merges_all_free_neighbours_into_one_block() {
        let mut h = Heap::new(128);
        let p1 = h.allocate(16).unwrap();
        let p2 = h.allocate(16).unwrap();
        let p3 = h.allocate(16).unwrap();
        h.free(p2).unwrap();
        h.free(p1).unwrap();
        h.free(p3).unwrap();
        assert_eq!(h.blocks().len(), 1);
        assert!(h.blocks()[0].is_free());
    }

    #[test]
    fn allocate_heap_size_then_one_more_fails() {
        let mut h = Heap::new(64);
        let p = h.allocate(64).unwrap();
        assert_eq!(p, 0);
        assert!(h.allocate(1).is_none());
    }

    #[test]
    fn allocate_more_than_heap_size_fails() {
        let mut h = Heap::new(64);
        assert!(h.allocate(65).is_none());
    }

    #[test]
    fn freeing_twice_is_invalid_free() {
        let mut h = Heap::new(64);
        let p = h.allocate(16).unwrap();
        h.free(p).unwrap();
        assert!(matches!(h.free(p), Err(HeapError::InvalidFree { address }) if address == p));
    }

    #[test]
    fn read_last_byte_ok_one_past_end_fails() {
        let mut h = Heap::new(64);
        let p = h.allocate(16).unwrap();
        assert!(h.read(p + 15).is_ok());
        assert!(matches!(h.read(p + 16), Err(HeapError::InvalidAccess { .. })));
    }

    #[test]
    fn allocate_zero_is_rejected_and_does_not_corrupt_invariants() {
        let mut h = Heap::new(64);
        assert_eq!(h.allocate(0), None);
        h.debug_assert_invariants();
        // The heap is otherwise unaffected: a normal allocation still works.
        assert_eq!(h.allocate(16), Some(0));
    }

    #[test]
    fn next_fit_resumes_after_last_allocation() {
        let mut h = Heap::new(128);
        h.set_strategy(Strategy::NextFit);
        let p1 = h.allocate(16).unwrap();
        let p2 = h.allocate(16).unwrap();
        let p3 = h.allocate(16).unwrap();
        h.free(p1).unwrap();
        let p4 = h.allocate(8).unwrap();
        assert_ne!(p4, p1, "next-fit should not immediately rewind to a freed earlier block");
        assert!(p4 >= p3);
    }

    #[test]
    fn invariants_hold_after_interleaved_allocations_and_frees() {
        let mut h = Heap::new(256);
        let mut live = Vec::new();
        for s in [16, 24, 8, 40, 16, 32] {
            if let Some(p) = h.allocate(s) {
                live.push(p);
            }
            h.debug_assert_invariants();
        }
        for (i, &p) in live.iter().enumerate() {
            if i % 2 == 0 {
                h.free(p).unwrap();
                h.debug_assert_invariants();
            }
        }
    }
}
