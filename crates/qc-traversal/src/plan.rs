//! Path/rank arithmetic over the complete binary embedding used by Merkle
//! trees and virtual maps (spec.md §3, §4.9), and the chunk layout a
//! [`crate::phase1::Phase1`] walks.
//!
//! Path 1 is the root; a node at path `p` has children `2p` (left) and
//! `2p + 1` (right), and parent `p / 2`. `rank(p) = floor(log2(p))`, so the
//! root is rank 0 and the leaf-parent level sits one rank above the first
//! leaf path.

use qc_merkle::LeafRange;

use crate::error::TraversalError;

/// The largest chunk-count exponent the policy will choose (spec.md §4.9:
/// "a power of two in `[2^12, ...]`" — the pack's retrievable sources gave
/// no exact upper bound, so this crate treats `2^12` as the practical cap
/// used in production-sized maps and shrinks it for small ones; see
/// DESIGN.md).
const MAX_CHUNK_EXPONENT: u32 = 12;

pub fn rank_of(path: u64) -> u32 {
    debug_assert!(path >= 1);
    63 - path.leading_zeros()
}

pub fn is_left_child(path: u64) -> bool {
    path > 1 && path % 2 == 0
}

pub fn parent_of(path: u64) -> u64 {
    path / 2
}

pub fn sibling_of(path: u64) -> u64 {
    path ^ 1
}

/// One chunk: a contiguous span of `chunk_width` sibling pairs at
/// [`TraversalPlan::chunk_start_rank`], identified by the path of its first
/// (left) member.
#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    pub index: u32,
    pub start_path: u64,
    pub chunk_width: u64,
}

impl Chunk {
    /// Exclusive upper bound of this chunk's span at the start rank.
    pub fn end_path(&self) -> u64 {
        self.start_path + self.chunk_width
    }

    pub fn contains(&self, path_at_start_rank: u64) -> bool {
        path_at_start_rank >= self.start_path && path_at_start_rank < self.end_path()
    }
}

/// The computed layout for traversing one virtual map's leaf range
/// (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct TraversalPlan {
    pub range: LeafRange,
    pub leaf_parent_rank: u32,
    pub chunk_start_rank: u32,
    pub total_chunks: u32,
    pub chunks: Vec<Chunk>,
}

impl TraversalPlan {
    pub fn new(range: LeafRange) -> Result<Self, TraversalError> {
        if range.first_leaf_path > range.last_leaf_path {
            return Err(TraversalError::EmptyLeafRange {
                first: range.first_leaf_path,
                last: range.last_leaf_path,
            });
        }

        let leaf_parent_rank = rank_of(range.first_leaf_path).saturating_sub(1);
        // Widen to whole sibling pairs so a chunk boundary never splits one
        // (phase 1's dirty-sibling push assumes a path's sibling is always
        // in its own chunk).
        let parent_start = parent_of(range.first_leaf_path) & !1;
        let parent_end = parent_of(range.last_leaf_path) | 1;
        let pair_count = (parent_end - parent_start + 1) / 2;

        // Largest power of two that still leaves at least one pair per
        // chunk, capped at 2^12 (see module docs above on why no tighter
        // upper bound survived retrieval).
        let exponent = (0..=MAX_CHUNK_EXPONENT)
            .rev()
            .find(|exp| (1u64 << exp) <= pair_count)
            .unwrap_or(0);
        let total_chunks = 1u32 << exponent;

        let base_pairs = pair_count / total_chunks as u64;
        let remainder = pair_count % total_chunks as u64;

        let mut chunks = Vec::with_capacity(total_chunks as usize);
        let mut cursor = parent_start;
        for index in 0..total_chunks {
            let pairs = base_pairs + u64::from((index as u64) < remainder);
            let width = pairs * 2;
            chunks.push(Chunk {
                index,
                start_path: cursor,
                chunk_width: width,
            });
            cursor += width;
        }

        Ok(Self {
            range,
            leaf_parent_rank,
            chunk_start_rank: leaf_parent_rank,
            total_chunks,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_of_matches_floor_log2() {
        assert_eq!(rank_of(1), 0);
        assert_eq!(rank_of(2), 1);
        assert_eq!(rank_of(3), 1);
        assert_eq!(rank_of(1024), 10);
    }

    #[test]
    fn sibling_and_parent_arithmetic() {
        assert_eq!(sibling_of(8), 9);
        assert_eq!(sibling_of(9), 8);
        assert_eq!(parent_of(9), 4);
        assert!(is_left_child(8));
        assert!(!is_left_child(9));
    }

    #[test]
    fn plan_covers_every_chunk_exactly_once() {
        let plan = TraversalPlan::new(LeafRange::new(1 << 20, (1 << 21) - 1)).unwrap();
        assert_eq!(plan.total_chunks, 1 << 12);
        let mut covered = 0u64;
        for chunk in &plan.chunks {
            covered += chunk.chunk_width;
            assert!(is_left_child(chunk.start_path));
        }
        assert_eq!(covered, 1u64 << plan.leaf_parent_rank);
    }

    #[test]
    fn small_map_caps_chunk_count_at_the_pair_span() {
        // one sibling pair (8, 9) -> a single chunk, not 2^12.
        let plan = TraversalPlan::new(LeafRange::new(16, 19)).unwrap();
        assert_eq!(plan.total_chunks, 1);
        assert_eq!(plan.chunks[0].chunk_width, 2);
    }

    #[test]
    fn four_pairs_split_into_four_chunks_without_splitting_a_pair() {
        // positions 8..=15 (4 pairs) -> 4 chunks of 1 pair (2 positions) each.
        let plan = TraversalPlan::new(LeafRange::new(16, 31)).unwrap();
        assert_eq!(plan.total_chunks, 4);
        for chunk in &plan.chunks {
            assert_eq!(chunk.chunk_width, 2);
            assert!(is_left_child(chunk.start_path));
        }
    }
}
