//! Tipset Tracker, spec.md §4.2.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use qc_event_core::EventDescriptor;
use shared_types::{Hash, Roster, Weight};

use crate::tipset::{advancement_score, Tipset};

struct TrackedEntry {
    tipset: Tipset,
    /// Birth round (or generation) used to decide ancientness at prune
    /// time, independent of which value the shadow graph uses.
    indicator: u64,
}

/// State: a mapping `event_hash -> Tipset`, the current ancient threshold,
/// and the roster against which tipsets are indexed (spec.md §4.2).
pub struct TipsetTracker {
    roster: RwLock<Arc<Roster>>,
    ancient_threshold: RwLock<u64>,
    entries: RwLock<HashMap<Hash, TrackedEntry>>,
}

impl TipsetTracker {
    pub fn new(roster: Arc<Roster>) -> Self {
        Self {
            roster: RwLock::new(roster),
            ancient_threshold: RwLock::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Swaps in a new roster snapshot. Existing tipsets keep their old
    /// dense indices; callers that need tipsets realigned to the new
    /// roster recompute on next `record`.
    pub fn set_roster(&self, roster: Arc<Roster>) {
        *self.roster.write() = roster;
    }

    pub fn roster(&self) -> Arc<Roster> {
        self.roster.read().clone()
    }

    /// Builds the new event's tipset: the element-wise max of all parent
    /// tipsets, with the event's own creator slot maxed against its own
    /// generation (spec.md §4.2 `record`).
    #[tracing::instrument(level = "debug", skip(self, parent_descriptors), fields(hash = %descriptor.hash))]
    pub fn record(
        &self,
        descriptor: &EventDescriptor,
        parent_descriptors: &[EventDescriptor],
        indicator: u64,
    ) -> Tipset {
        let roster = self.roster();
        let len = roster.len();

        let entries = self.entries.read();
        let mut merged = Tipset::empty(len);
        for parent in parent_descriptors {
            if let Some(parent_entry) = entries.get(&parent.hash) {
                merged = merged.merged_with(&parent_entry.tipset);
            }
        }
        drop(entries);

        let tipset = match roster.position_of(descriptor.creator) {
            Some(position) => merged.with_own_generation(position, descriptor.generation),
            None => merged,
        };

        self.entries.write().insert(
            descriptor.hash,
            TrackedEntry {
                tipset: tipset.clone(),
                indicator,
            },
        );
        tipset
    }

    pub fn get(&self, hash: &Hash) -> Option<Tipset> {
        self.entries.read().get(hash).map(|e| e.tipset.clone())
    }

    /// `advancement_score(from, to) -> (total_weight, advancing_weight)`,
    /// computed only over creators in the current roster.
    pub fn advancement_score(&self, from: &Tipset, to: &Tipset) -> (Weight, Weight) {
        advancement_score(from, to, &self.roster())
    }

    /// Drops tipsets for events whose indicator is below `new_ancient_threshold`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn prune(&self, new_ancient_threshold: u64) {
        *self.ancient_threshold.write() = new_ancient_threshold;
        self.entries
            .write()
            .retain(|_, entry| entry.indicator >= new_ancient_threshold);
    }

    pub fn ancient_threshold(&self) -> u64 {
        *self.ancient_threshold.read()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{NodeId, RosterEntry};

    fn roster(n: usize) -> Arc<Roster> {
        let entries = (0..n)
            .map(|i| RosterEntry {
                node_id: NodeId::new(i as u64),
                weight: 1,
                signing_cert: vec![],
                public_key: [0u8; 32],
                gossip_endpoint: format!("127.0.0.1:{}", 30000 + i),
            })
            .collect();
        Arc::new(Roster::new(0, entries))
    }

    fn descriptor(hash_byte: u8, creator: u64, generation: u64) -> EventDescriptor {
        EventDescriptor::new(Hash::from_bytes([hash_byte; 48]), NodeId::new(creator), 1, generation)
    }

    #[test]
    fn genesis_event_tipset_has_only_its_own_slot() {
        let tracker = TipsetTracker::new(roster(3));
        let d = descriptor(1, 0, 0);
        let tipset = tracker.record(&d, &[], 1);
        assert_eq!(tipset.generation_at(0), Some(0));
        assert_eq!(tipset.generation_at(1), None);
    }

    #[test]
    fn child_tipset_merges_parent_tipsets() {
        let tracker = TipsetTracker::new(roster(3));
        let genesis_a = descriptor(1, 0, 0);
        tracker.record(&genesis_a, &[], 1);
        let genesis_b = descriptor(2, 1, 0);
        tracker.record(&genesis_b, &[], 1);

        let child = descriptor(3, 0, 1);
        let tipset = tracker.record(&child, &[genesis_a, genesis_b], 1);
        assert_eq!(tipset.generation_at(0), Some(1));
        assert_eq!(tipset.generation_at(1), Some(0));
    }

    #[test]
    fn prune_drops_entries_below_threshold() {
        let tracker = TipsetTracker::new(roster(3));
        tracker.record(&descriptor(1, 0, 0), &[], 5);
        tracker.record(&descriptor(2, 1, 0), &[], 15);

        tracker.prune(10);

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.ancient_threshold(), 10);
    }
}
