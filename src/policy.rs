//! Placement policies: the rules by which [`crate::heap::Heap::allocate`]
//! picks a free block for a request.
//!
//! Each policy is a pure selector over the current block list and a
//! requested size; none of them mutate anything. Keeping selection as a free
//! function rather than a method on `Heap` keeps the allocation core
//! policy-agnostic — adding a fifth policy means adding a function here, not
//! touching `allocate` itself.

use crate::block::Block;

/// The placement policy a [`crate::heap::Heap`] uses to choose among
/// candidate free blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    FirstFit,
    BestFit,
    WorstFit,
    NextFit,
}

/// Selects the index of the free block `blocks` should use to satisfy
/// `size`, according to `strategy`. `cursor` is only consulted by
/// [`Strategy::NextFit`]; the other policies ignore it.
///
/// Returns `None` if no free block can hold at least `size` bytes.
pub fn select(blocks: &[Block], size: usize, strategy: Strategy, cursor: usize) -> Option<usize> {
    match strategy {
        Strategy::FirstFit => first_fit(blocks, size),
        Strategy::BestFit => best_fit(blocks, size),
        Strategy::WorstFit => worst_fit(blocks, size),
        Strategy::NextFit => next_fit(blocks, size, cursor),
    }
}

/// First free block, in list order, with `size >= request`.
fn first_fit(blocks: &[Block], size: usize) -> Option<usize> {
    blocks
        .iter()
        .position(|b| b.is_free() && b.size() >= size)
}

/// Free block with the smallest `size >= request`; ties broken by the first
/// such block in list order.
fn best_fit(blocks: &[Block], size: usize) -> Option<usize> {
    blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.is_free() && b.size() >= size)
        .min_by_key(|(idx, b)| (b.size(), *idx))
        .map(|(idx, _)| idx)
}

/// Free block with the largest `size >= request`; ties broken by the first
/// such block in list order.
fn worst_fit(blocks: &[Block], size: usize) -> Option<usize> {
    blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.is_free() && b.size() >= size)
        .max_by_key(|(idx, b)| (b.size(), std::cmp::Reverse(*idx)))
        .map(|(idx, _)| idx)
}

/// Scans starting at `cursor`, wrapping modulo `blocks.len()`, and returns
/// the first free block with `size >= request` encountered in scan order.
fn next_fit(blocks: &[Block], size: usize, cursor: usize) -> Option<usize> {
    let len = blocks.len();
    if len == 0 {
        return None;
    }
    let start = cursor % len;
    (0..len)
        .map(|offset| (start + offset) % len)
        .find(|&idx| blocks[idx].is_free() && blocks[idx].size() >= size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(spec: &[(usize, usize, bool)]) -> Vec<Block> {
        spec.iter()
            .map(|&(start, size, free)| Block::new(start, size, free))
            .collect()
    }

    #[test]
    fn first_fit_picks_first_big_enough_free_block() {
        let bs = blocks(&[(0, 8, false), (8, 16, true), (24, 32, true)]);
        assert_eq!(first_fit(&bs, 10), Some(1));
    }

    #[test]
    fn first_fit_skips_too_small_blocks() {
        let bs = blocks(&[(0, 4, true), (4, 16, true)]);
        assert_eq!(first_fit(&bs, 10), Some(1));
    }

    #[test]
    fn first_fit_returns_none_when_nothing_fits() {
        let bs = blocks(&[(0, 4, true), (4, 4, false)]);
        assert_eq!(first_fit(&bs, 10), None);
    }

    #[test]
    fn best_fit_picks_smallest_sufficient_block() {
        let bs = blocks(&[(0, 64, true), (64, 16, true), (80, 32, true)]);
        assert_eq!(best_fit(&bs, 16), Some(1));
    }

    #[test]
    fn best_fit_ties_break_to_first_in_list_order() {
        let bs = blocks(&[(0, 16, true), (16, 16, true)]);
        assert_eq!(best_fit(&bs, 16), Some(0));
    }

    #[test]
    fn worst_fit_picks_largest_sufficient_block() {
        let bs = blocks(&[(0, 16, true), (16, 64, true), (80, 32, true)]);
        assert_eq!(worst_fit(&bs, 16), Some(1));
    }

    #[test]
    fn worst_fit_ties_break_to_first_in_list_order() {
        let bs = blocks(&[(0, 32, true), (32, 32, true)]);
        assert_eq!(worst_fit(&bs, 16), Some(0));
    }

    #[test]
    fn next_fit_resumes_from_cursor_and_wraps() {
        let bs = blocks(&[(0, 16, true), (16, 16, true), (32, 16, true)]);
        assert_eq!(next_fit(&bs, 8, 1), Some(1));
        assert_eq!(next_fit(&bs, 8, 2), Some(2));
    }

    #[test]
    fn next_fit_wraps_around_to_earlier_blocks() {
        let bs = blocks(&[(0, 16, true), (16, 4, false), (32, 4, false)]);
        assert_eq!(next_fit(&bs, 8, 1), Some(0));
    }

    #[test]
    fn next_fit_empty_list_is_none() {
        let bs: Vec<Block> = Vec::new();
        assert_eq!(next_fit(&bs, 1, 0), None);
    }
}
