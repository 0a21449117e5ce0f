//! Tipset: per-event vector of known max generations by each creator
//! (spec.md §3, GLOSSARY).

use shared_types::{Roster, Weight};

/// A dense, roster-position-indexed vector of known max generations.
/// `-1` at a position means no known event by that roster member is yet in
/// this tipset's ancestry — generation `0` (genesis) is a valid value, so a
/// sentinel other than `0` is needed (spec.md §9: "arena-allocate tipsets
/// and index by dense integers ... for cache locality").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tipset {
    generations: Vec<i64>,
}

const UNKNOWN: i64 = -1;

impl Tipset {
    /// An empty tipset over a roster of `len` members, all unknown.
    pub fn empty(len: usize) -> Self {
        Self {
            generations: vec![UNKNOWN; len],
        }
    }

    pub fn generation_at(&self, position: usize) -> Option<u64> {
        self.generations
            .get(position)
            .copied()
            .filter(|g| *g != UNKNOWN)
            .map(|g| g as u64)
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    fn set_max(&mut self, position: usize, generation: u64) {
        let g = generation as i64;
        if self.generations[position] < g {
            self.generations[position] = g;
        }
    }

    /// Element-wise max of `self` and `other`, per roster position.
    pub fn merged_with(&self, other: &Tipset) -> Tipset {
        let len = self.generations.len().max(other.generations.len());
        let mut merged = Tipset::empty(len);
        for i in 0..len {
            if let Some(g) = self.generations.get(i).copied().filter(|g| *g != UNKNOWN) {
                merged.set_max(i, g as u64);
            }
            if let Some(g) = other.generations.get(i).copied().filter(|g| *g != UNKNOWN) {
                merged.set_max(i, g as u64);
            }
        }
        merged
    }

    pub fn with_own_generation(&self, position: usize, generation: u64) -> Tipset {
        let mut out = self.clone();
        if position >= out.generations.len() {
            out.generations.resize(position + 1, UNKNOWN);
        }
        out.set_max(position, generation);
        out
    }
}

/// Sum of roster weights over creators where `from[c] > to[c]`, and the
/// roster's total weight (spec.md §3 "Tipset Advancement Score").
pub fn advancement_score(from: &Tipset, to: &Tipset, roster: &Roster) -> (Weight, Weight) {
    let total_weight = roster.total_weight();
    let mut advancing_weight: Weight = 0;
    for (position, entry) in roster.entries().iter().enumerate() {
        let from_gen = from.generations.get(position).copied().unwrap_or(UNKNOWN);
        let to_gen = to.generations.get(position).copied().unwrap_or(UNKNOWN);
        if from_gen > to_gen {
            advancing_weight += entry.weight;
        }
    }
    (total_weight, advancing_weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{NodeId, RosterEntry};

    fn roster(n: usize) -> Roster {
        let entries = (0..n)
            .map(|i| RosterEntry {
                node_id: NodeId::new(i as u64),
                weight: 1,
                signing_cert: vec![],
                public_key: [0u8; 32],
                gossip_endpoint: format!("127.0.0.1:{}", 30000 + i),
            })
            .collect();
        Roster::new(0, entries)
    }

    #[test]
    fn advancement_score_counts_strictly_advancing_creators() {
        let r = roster(10);
        let to = Tipset::empty(10).with_own_generation(0, 2);
        let to = (1..10).fold(to, |t, i| t.with_own_generation(i, 2));
        let from = to.with_own_generation(0, 3);

        let (total, advancing) = advancement_score(&from, &to, &r);
        assert_eq!(total, 10);
        assert_eq!(advancing, 1);
    }

    #[test]
    fn unknown_creator_never_advances_over_unknown() {
        let r = roster(3);
        let empty = Tipset::empty(3);
        let (_, advancing) = advancement_score(&empty, &empty, &r);
        assert_eq!(advancing, 0);
    }

    #[test]
    fn merged_tipset_takes_elementwise_max() {
        let a = Tipset::empty(3).with_own_generation(0, 5);
        let b = Tipset::empty(3).with_own_generation(0, 2).with_own_generation(1, 7);
        let merged = a.merged_with(&b);
        assert_eq!(merged.generation_at(0), Some(5));
        assert_eq!(merged.generation_at(1), Some(7));
        assert_eq!(merged.generation_at(2), None);
    }
}
