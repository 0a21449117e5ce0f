//! Phase 1: pessimistic internal-node scheduling over the chunk layout
//! computed by [`crate::plan::TraversalPlan`] (spec.md §4.9).
//!
//! Each chunk keeps a deque of paths still needing a response and a cursor
//! that walks the chunk's remaining positions one at a time once the deque
//! runs dry. The chunk's very first pair gets a "pessimistic" shortcut: its
//! left child is requested as normal, but as soon as it comes back clean the
//! driver also requests its parent — one rank up — before waiting to see
//! whether the right sibling is even worth checking. If that parent comes
//! back clean too, both children are implied clean (a clean parent hash
//! commits to both) and the cursor skips the right sibling outright. If the
//! parent comes back dirty, the known-clean child can't be the cause, so
//! only its untested sibling is pushed back for an explicit check — the
//! parent request itself turns out to have been wasted, which is the
//! "small redundancy traded for throughput" the policy accepts (spec.md
//! §4.9, §8 property 7). Every other pair in the chunk is checked directly;
//! see DESIGN.md for why the shortcut is not attempted chunk-wide.

use std::collections::{HashSet, VecDeque};

use crate::plan::{is_left_child, parent_of, rank_of, sibling_of, TraversalPlan};

struct ChunkState {
    start_path: u64,
    deque: VecDeque<u64>,
    cursor: u64,
    end_path: u64,
    outstanding: u32,
    climbed: bool,
    /// Set while waiting on the one speculative parent-level response this
    /// chunk will ever issue.
    pending_climb: Option<u64>,
}

impl ChunkState {
    fn is_done(&self) -> bool {
        self.deque.is_empty() && self.cursor >= self.end_path && self.outstanding == 0
    }
}

/// Drives phase 1 of the traversal over one virtual map's chunk layout.
/// Synchronous by design: the caller (`qc-reconnect`'s push view) owns the
/// actual request/response transport and feeds responses back in as they
/// arrive, in any order, possibly interleaved across chunks.
pub struct Phase1 {
    chunk_start_rank: u32,
    chunks: Vec<ChunkState>,
    /// Paths confirmed clean. Consulted by phase 2 to skip whole subtrees.
    clean_cache: HashSet<u64>,
    next_chunk_to_poll: usize,
}

impl Phase1 {
    pub fn new(plan: &TraversalPlan) -> Self {
        let chunks = plan
            .chunks
            .iter()
            .map(|chunk| ChunkState {
                start_path: chunk.start_path,
                deque: VecDeque::from([chunk.start_path]),
                cursor: chunk.start_path + 1,
                end_path: chunk.end_path(),
                outstanding: 0,
                climbed: false,
                pending_climb: None,
            })
            .collect();

        Self {
            chunk_start_rank: plan.chunk_start_rank,
            chunks,
            clean_cache: HashSet::new(),
            next_chunk_to_poll: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.chunks.iter().all(ChunkState::is_done)
    }

    /// Set of paths confirmed clean so far; phase 2 treats any leaf whose
    /// ancestor is in here as already known clean.
    pub fn clean_cache(&self) -> &HashSet<u64> {
        &self.clean_cache
    }

    /// Pulls the next path to request, round-robining across chunks with
    /// outstanding work so no single chunk starves the others.
    pub fn next_request(&mut self) -> Option<u64> {
        let chunk_count = self.chunks.len();
        for offset in 0..chunk_count {
            let index = (self.next_chunk_to_poll + offset) % chunk_count;
            let chunk = &mut self.chunks[index];
            if let Some(path) = chunk.deque.pop_front() {
                chunk.outstanding += 1;
                self.next_chunk_to_poll = (index + 1) % chunk_count;
                return Some(path);
            }
            while chunk.cursor < chunk.end_path && self.clean_cache.contains(&chunk.cursor) {
                chunk.cursor += 1;
            }
            if chunk.cursor < chunk.end_path {
                let path = chunk.cursor;
                chunk.cursor += 1;
                chunk.outstanding += 1;
                self.next_chunk_to_poll = (index + 1) % chunk_count;
                return Some(path);
            }
        }
        None
    }

    /// Feeds back a teacher response for `path` (which chunk it belongs to
    /// is derived from the path itself, not tracked by the caller).
    pub fn handle_response(&mut self, path: u64, clean: bool) {
        let Some(chunk_index) = self.chunk_owning(path) else {
            return;
        };

        if self.chunks[chunk_index].pending_climb == Some(path) {
            self.chunks[chunk_index].pending_climb = None;
            self.chunks[chunk_index].outstanding =
                self.chunks[chunk_index].outstanding.saturating_sub(1);
            self.handle_climb_response(chunk_index, path, clean);
            return;
        }

        let chunk = &mut self.chunks[chunk_index];
        chunk.outstanding = chunk.outstanding.saturating_sub(1);

        if clean {
            self.clean_cache.insert(path);
            self.purge_cached_children(path);
            let chunk = &mut self.chunks[chunk_index];
            if !chunk.climbed && path == chunk.start_path && is_left_child(path) {
                chunk.climbed = true;
                let parent = parent_of(path);
                chunk.pending_climb = Some(parent);
                chunk.deque.push_front(parent);
            }
        }
        // dirty: nothing further to schedule here — the cursor already
        // covers every remaining position in the chunk one at a time, and
        // a dirty leaf-parent simply never enters the clean cache, which
        // is what phase 2 checks against.
    }

    fn handle_climb_response(&mut self, chunk_index: usize, parent_path: u64, clean: bool) {
        let left = parent_path * 2;
        let right = parent_path * 2 + 1;
        if clean {
            // A clean parent hash commits to both children at once.
            self.clean_cache.insert(left);
            self.clean_cache.insert(right);
            self.purge_cached_children(left);
            self.purge_cached_children(right);
        } else {
            let known_clean_child = if self.clean_cache.contains(&left) {
                left
            } else {
                right
            };
            let untested_sibling = sibling_of(known_clean_child);
            self.chunks[chunk_index]
                .deque
                .push_back(untested_sibling);
        }
    }

    fn purge_cached_children(&mut self, path: u64) {
        self.clean_cache.remove(&(path * 2));
        self.clean_cache.remove(&(path * 2 + 1));
    }

    fn chunk_owning(&self, path_at_start_rank_or_above: u64) -> Option<usize> {
        // A pending climb response sits one rank above chunk_start_rank;
        // project it back down to its left child to find the owning
        // chunk's span.
        let probe = if rank_of(path_at_start_rank_or_above) < self.chunk_start_rank {
            path_at_start_rank_or_above * 2
        } else {
            path_at_start_rank_or_above
        };
        self.chunks
            .iter()
            .enumerate()
            .find(|(_, c)| probe >= c.start_path && probe < c.end_path)
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::TraversalPlan;
    use qc_merkle::LeafRange;
    use std::collections::HashMap;

    /// All-clean map: no dirty leaves, so every chunk should resolve in
    /// roughly its width worth of requests, with the first pair in each
    /// chunk needing at most two (spec.md §8 property 7).
    #[test]
    fn all_clean_chunk_resolves_within_its_width() {
        let plan = TraversalPlan::new(LeafRange::new(1 << 20, (1 << 21) - 1)).unwrap();
        let mut phase1 = Phase1::new(&plan);
        let mut requests = 0u32;

        while let Some(path) = phase1.next_request() {
            requests += 1;
            phase1.handle_response(path, true);
        }

        assert!(phase1.is_done());
        let positions_at_start_rank = 1u64 << plan.leaf_parent_rank;
        // at most one position per chunk member, plus one climb probe per chunk
        assert!(requests as u64 <= positions_at_start_rank + plan.total_chunks as u64);
    }

    #[test]
    fn dirty_left_child_is_not_silently_skipped() {
        let plan = TraversalPlan::new(LeafRange::new(16, 31)).unwrap();
        let mut phase1 = Phase1::new(&plan);
        let mut seen = HashMap::new();

        while let Some(path) = phase1.next_request() {
            let clean = *seen.entry(path).or_insert(false);
            phase1.handle_response(path, clean);
            seen.insert(path, true);
        }
        assert!(phase1.is_done());
        // every position in range must have been asked about at least once
        for path in 8u64..16 {
            assert!(seen.contains_key(&path), "path {path} was never requested");
        }
    }

    #[test]
    fn dirty_climbed_parent_falls_back_to_untested_sibling() {
        let plan = TraversalPlan::new(LeafRange::new(1 << 20, (1 << 21) - 1)).unwrap();
        let mut phase1 = Phase1::new(&plan);
        let mut climb_seen = false;

        while let Some(path) = phase1.next_request() {
            if rank_of(path) + 1 == plan.chunk_start_rank {
                climb_seen = true;
                phase1.handle_response(path, false);
            } else {
                phase1.handle_response(path, true);
            }
        }

        assert!(climb_seen);
        assert!(phase1.is_done());
    }
}
