//! Ties [`crate::plan::TraversalPlan`], [`crate::phase1::Phase1`] and
//! [`crate::phase2::Phase2`] into the single two-phase walk `qc-reconnect`'s
//! virtual-map learner drives per subtree (spec.md §4.8, §4.9).

use qc_merkle::LeafRange;
use tracing::debug;

use crate::error::TraversalError;
use crate::phase1::Phase1;
use crate::phase2::Phase2;
use crate::plan::TraversalPlan;

/// Which phase a [`TraversalPolicy`] is currently in.
pub enum Request {
    /// Ask the teacher whether the internal node at `path` is clean.
    Internal(u64),
    /// Ask the teacher for the leaf at `path` — it is known (or assumed)
    /// dirty and must be transferred.
    Leaf(u64),
}

/// Drives the two phases for one virtual map's leaf range. `next_request`
/// and `handle_internal_response` cover phase 1; once phase 1 is done the
/// policy switches itself to phase 2 and `next_request` starts yielding
/// leaves directly (no response needed, since phase 2 never prunes based on
/// teacher replies — only on the clean cache phase 1 already built).
pub struct TraversalPolicy {
    plan: TraversalPlan,
    phase1: Phase1,
    phase2_cursor: Option<u64>,
}

impl TraversalPolicy {
    pub fn new(range: LeafRange) -> Result<Self, TraversalError> {
        let plan = TraversalPlan::new(range)?;
        let phase1 = Phase1::new(&plan);
        Ok(Self {
            plan,
            phase1,
            phase2_cursor: None,
        })
    }

    pub fn total_chunks(&self) -> u32 {
        self.plan.total_chunks
    }

    /// Feeds back a phase-1 teacher response for `path`. No-op once phase 2
    /// has started (leaves never get fed back through this method).
    pub fn handle_internal_response(&mut self, path: u64, clean: bool) {
        if self.phase2_cursor.is_none() {
            self.phase1.handle_response(path, clean);
        }
    }

    /// Next thing to request, or `None` once both phases are exhausted.
    pub fn next_request(&mut self) -> Option<Request> {
        if self.phase2_cursor.is_none() {
            if let Some(path) = self.phase1.next_request() {
                return Some(Request::Internal(path));
            }
            debug!(
                total_chunks = self.plan.total_chunks,
                "phase 1 exhausted, switching to leaf scan"
            );
            self.phase2_cursor = Some(self.plan.range.first_leaf_path);
        }

        let mut phase2 = Phase2::new(
            self.phase2_cursor.unwrap(),
            self.plan.range.last_leaf_path,
            self.phase1.clean_cache(),
        );
        let next = phase2.next();
        self.phase2_cursor = Some(match next {
            Some(path) => path + 1,
            None => self.plan.range.last_leaf_path + 1,
        });
        next.map(Request::Leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::rank_of;

    #[test]
    fn all_clean_map_transfers_no_leaves() {
        let mut policy =
            TraversalPolicy::new(LeafRange::new(1 << 20, (1 << 21) - 1)).unwrap();
        let mut internal_requests = 0u32;
        let mut leaf_requests = 0u32;

        loop {
            match policy.next_request() {
                Some(Request::Internal(path)) => {
                    internal_requests += 1;
                    policy.handle_internal_response(path, true);
                }
                Some(Request::Leaf(_)) => leaf_requests += 1,
                None => break,
            }
        }

        assert_eq!(leaf_requests, 0, "zero dirty leaves must transfer zero leaves");
        // one request per leaf-parent position, plus one speculative climb
        // per chunk and minus the one right-sibling each successful climb
        // made unnecessary — net requests stay within positions + chunks.
        let positions_at_leaf_parent_rank = 1u64 << (rank_of((1u64 << 20)) - 1);
        assert!(
            internal_requests as u64
                <= positions_at_leaf_parent_rank + policy.total_chunks() as u64
        );
    }

    #[test]
    fn fully_dirty_map_transfers_every_leaf() {
        let mut policy = TraversalPolicy::new(LeafRange::new(16, 19)).unwrap();
        let mut leaves = Vec::new();

        loop {
            match policy.next_request() {
                Some(Request::Internal(path)) => policy.handle_internal_response(path, false),
                Some(Request::Leaf(path)) => leaves.push(path),
                None => break,
            }
        }

        leaves.sort_unstable();
        assert_eq!(leaves, vec![16, 17, 18, 19]);
    }
}
