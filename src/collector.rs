//! Mark-and-sweep garbage collection over a [`Heap`] driven by its embedded
//! root set.

use tracing::{debug, trace};

use crate::heap::Heap;

/// Runs mark-and-sweep collections against a borrowed [`Heap`].
///
/// Takes only the heap (not a separate root set) because the root set is
/// heap-owned: the set `collect` traces from is always `heap.root_set()`.
pub struct Collector<'a> {
    heap: &'a mut Heap,
}

impl<'a> Collector<'a> {
    pub fn new(heap: &'a mut Heap) -> Self {
        Self { heap }
    }

    /// Marks every block reachable from the heap's root set, then sweeps
    /// (frees) every allocated block that was not reached.
    ///
    /// After `collect` returns: every block reachable from the root set
    /// through reference chains remains allocated with `marked == false`;
    /// every other previously-allocated block is now free, coalesced with
    /// its free neighbours.
    pub fn collect(&mut self) {
        self.mark();
        self.sweep();
        #[cfg(debug_assertions)]
        self.heap.debug_assert_invariants();
    }

    fn mark(&mut self) {
        // Snapshotted up front: `iterate()` borrows the root set immutably,
        // but marking needs `&mut self.heap` to flip `marked` bits.
        let roots: Vec<usize> = self.heap.root_set().iterate().collect();
        for root in roots {
            self.mark_from(root);
        }
    }

    /// Depth-first mark starting at `address`. The three base cases —
    /// address not allocated, already marked, or free — guarantee
    /// termination over the reachable sub-graph even when `references`
    /// contains cycles.
    fn mark_from(&mut self, address: usize) {
        let Some(block) = self.heap.find_block(address) else {
            return;
        };
        if block.is_free() || block.is_marked() {
            return;
        }

        trace!(address, "marking");
        let Some(block) = self.heap.find_block_mut(address) else {
            return;
        };
        block.mark();
        let refs: Vec<usize> = block.references().to_vec();
        for r in refs {
            self.mark_from(r);
        }
    }

    fn sweep(&mut self) {
        let garbage: Vec<usize> = self
            .heap
            .allocations()
            .filter(|(_, b)| !b.is_marked())
            .map(|(addr, _)| addr)
            .collect();

        debug!(count = garbage.len(), "sweeping unmarked allocations");
        for addr in garbage {
            // Known-valid at snapshot time: sweep only frees blocks that
            // were allocated and unmarked, and freeing never unmarks a
            // different block mid-sweep.
            let _ = self.heap.free(addr);
        }

        for block in self.heap_blocks_mut() {
            block.unmark();
        }
    }

    fn heap_blocks_mut(&mut self) -> impl Iterator<Item = &mut crate::block::Block> {
        self.heap.blocks_mut().iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    #[test]
    fn mark_sweep_keeps_reachable_chain_alive() {
        let mut h = Heap::new(256);
        let a = h.allocate(16).unwrap();
        let b = h.allocate(16).unwrap();
        let c = h.allocate(16).unwrap();
        let d = h.allocate(16).unwrap();

        h.find_block_mut(a).unwrap().add_reference(b);
        h.find_block_mut(b).unwrap().add_reference(c);
        h.root_set_mut().add(a);

        Collector::new(&mut h).collect();

        assert!(!h.find_block(a).unwrap().is_marked());
        assert!(!h.find_block(a).unwrap().is_free());
        assert!(!h.find_block(b).unwrap().is_free());
        assert!(!h.find_block(c).unwrap().is_free());
        assert!(h.find_block(d).unwrap().is_free());
    }

    #[test]
    fn collect_with_no_roots_frees_everything() {
        let mut h = Heap::new(256);
        h.allocate(16).unwrap();
        h.allocate(16).unwrap();
        h.allocate(16).unwrap();

        Collector::new(&mut h).collect();

        assert_eq!(h.allocation_count(), 0);
    }

    #[test]
    fn cycles_terminate_and_keep_the_cycle_alive() {
        let mut h = Heap::new(256);
        let a = h.allocate(16).unwrap();
        let b = h.allocate(16).unwrap();
        h.find_block_mut(a).unwrap().add_reference(b);
        h.find_block_mut(b).unwrap().add_reference(a);
        h.root_set_mut().add(a);

        Collector::new(&mut h).collect();

        assert!(!h.find_block(a).unwrap().is_free());
        assert!(!h.find_block(b).unwrap().is_free());
    }

    #[test]
    fn collecting_twice_with_no_mutation_is_idempotent() {
        let mut h = Heap::new(256);
        let a = h.allocate(16).unwrap();
        h.root_set_mut().add(a);
        Collector::new(&mut h).collect();
        let snapshot = h.blocks().to_vec();
        Collector::new(&mut h).collect();
        assert_eq!(h.blocks(), snapshot.as_slice());
    }

    #[test]
    fn stale_root_to_freed_address_is_ignored() {
        let mut h = Heap::new(128);
        let a = h.allocate(16).unwrap();
        h.free(a).unwrap();
        h.root_set_mut().add(a);

        // Should not panic despite the root pointing at a free block.
        Collector::new(&mut h).collect();
        assert_eq!(h.allocation_count(), 0);
    }

    #[test]
    fn root_to_nonexistent_start_is_ignored() {
        let mut h = Heap::new(128);
        h.allocate(16).unwrap();
        h.root_set_mut().add(9_999_999);

        Collector::new(&mut h).collect();
        assert_eq!(h.allocation_count(), 0);
    }
}
