//! Virtual-map view: drives [`qc_traversal::TraversalPolicy`]'s two-phase
//! walk against a subtree whose root advertised `custom_reconnect()`
//! (spec.md §4.7, §4.8, §4.9). Internal nodes above a virtual map's leaves
//! are never materialized, so "clean" is decided by comparing hashes
//! computed arithmetically from leaf content rather than by walking real
//! `MerkleNode`s, the same distinction `qc_merkle::virtual_map` draws.
//!
//! Synchronous by design, like [`crate::push_view`]: the caller owns the
//! transport and feeds teacher answers back in as they arrive.

use std::collections::HashMap;
use std::sync::Arc;

use qc_merkle::{DataSource, LeafRange, VirtualMap};
use qc_traversal::{Request, TraversalPolicy};
use shared_crypto::Hasher;
use shared_types::Hash;

use crate::error::AbortReason;

/// Computes the hash at `path` within `map`, recursing arithmetically into
/// children until the leaf range is reached (spec.md §4.9: virtual map
/// internal nodes have no on-heap representation).
fn node_hash(map: &VirtualMap, path: u64, hasher: &dyn Hasher) -> Option<Hash> {
    if map.range().contains(path) {
        return map.leaf_hash(path).ok().flatten();
    }
    let left = node_hash(map, path * 2, hasher)?;
    let right = node_hash(map, path * 2 + 1, hasher)?;
    Some(hasher.hash_many(&[left.as_bytes(), right.as_bytes()]))
}

/// Teacher half: answers phase-1 internal queries and phase-2 leaf queries
/// against the current map, judging cleanliness against whatever the map
/// looked like at the round the learner is known to already hold.
pub struct VirtualTeacher<'a> {
    current: &'a VirtualMap,
    previous: Option<&'a VirtualMap>,
    hasher: &'a dyn Hasher,
}

impl<'a> VirtualTeacher<'a> {
    pub fn new(
        current: &'a VirtualMap,
        previous: Option<&'a VirtualMap>,
        hasher: &'a dyn Hasher,
    ) -> Self {
        Self { current, previous, hasher }
    }

    /// Whether `path`'s subtree is unchanged since the learner's prior
    /// round. With no prior round to compare against, everything is dirty.
    pub fn answer_internal(&self, path: u64) -> bool {
        let Some(previous) = self.previous else {
            return false;
        };
        match (
            node_hash(self.current, path, self.hasher),
            node_hash(previous, path, self.hasher),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn answer_leaf(&self, path: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.current.leaf_value(path).ok().flatten()
    }
}

/// Learner half: drives a [`TraversalPolicy`] and reconstructs the leaf set
/// for `range`, filling in untouched leaves from the previous round's
/// snapshot rather than re-requesting content the teacher already told it
/// (via a clean internal ancestor) is unchanged.
pub struct VirtualLearner<'a> {
    policy: TraversalPolicy,
    range: LeafRange,
    previous: Option<&'a VirtualMap>,
    learned: HashMap<u64, (Vec<u8>, Vec<u8>)>,
    done: bool,
}

pub enum ViewRequest {
    Internal(u64),
    Leaf(u64),
}

impl<'a> VirtualLearner<'a> {
    pub fn new(
        range: LeafRange,
        previous: Option<&'a VirtualMap>,
    ) -> Result<Self, qc_traversal::TraversalError> {
        Ok(Self {
            policy: TraversalPolicy::new(range)?,
            range,
            previous,
            learned: HashMap::new(),
            done: false,
        })
    }

    pub fn next_request(&mut self) -> Option<ViewRequest> {
        let request = self.policy.next_request();
        if request.is_none() {
            self.done = true;
        }
        match request? {
            Request::Internal(path) => Some(ViewRequest::Internal(path)),
            Request::Leaf(path) => Some(ViewRequest::Leaf(path)),
        }
    }

    pub fn handle_internal_response(&mut self, path: u64, clean: bool) {
        self.policy.handle_internal_response(path, clean);
    }

    pub fn handle_leaf_response(
        &mut self,
        path: u64,
        content: Option<(Vec<u8>, Vec<u8>)>,
    ) -> Result<(), AbortReason> {
        let content = content.ok_or(AbortReason::ProtocolViolation)?;
        self.learned.insert(path, content);
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Assembles the learned leaf set into an in-memory virtual map, filling
    /// every leaf the teacher never sent from the previous snapshot.
    pub fn finish(self) -> Result<VirtualMap, AbortReason> {
        let mut leaves = self.learned;
        let mut cursor = self.range.first_leaf_path;
        while cursor <= self.range.last_leaf_path {
            if !leaves.contains_key(&cursor) {
                let carried = self
                    .previous
                    .and_then(|p| p.leaf_value(cursor).ok().flatten())
                    .ok_or(AbortReason::ProtocolViolation)?;
                leaves.insert(cursor, carried);
            }
            cursor += 1;
        }
        Ok(VirtualMap::new(
            self.range,
            Box::new(InMemorySnapshot { leaves }),
        ))
    }
}

struct InMemorySnapshot {
    leaves: HashMap<u64, (Vec<u8>, Vec<u8>)>,
}

impl DataSource for InMemorySnapshot {
    fn leaf_hash(&self, path: u64) -> Option<Hash> {
        use shared_crypto::Sha384Hasher;
        self.leaves.get(&path).map(|(k, v)| Sha384Hasher.hash_many(&[k, v]))
    }

    fn leaf_value(&self, path: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.leaves.get(&path).cloned()
    }
}

/// Drives `learner` and `teacher` to completion without any network,
/// exercising the exact phase transitions the async layer will drive one
/// request at a time. Used by tests; the real driver in `qc-reconnect`'s
/// session layer interleaves this with other views over one transport.
pub fn run_in_process(
    learner: &mut VirtualLearner,
    teacher: &VirtualTeacher,
) -> Result<(), AbortReason> {
    while let Some(request) = learner.next_request() {
        match request {
            ViewRequest::Internal(path) => {
                let clean = teacher.answer_internal(path);
                learner.handle_internal_response(path, clean);
            }
            ViewRequest::Leaf(path) => {
                let content = teacher.answer_leaf(path);
                learner.handle_leaf_response(path, content)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_merkle::test_support::InMemoryDataSource;
    use shared_crypto::Sha384Hasher;
    use std::collections::HashMap as StdHashMap;

    fn map_of(range: LeafRange, entries: &[(u64, &str, &str)]) -> VirtualMap {
        let mut leaves = StdHashMap::new();
        for (path, k, v) in entries {
            leaves.insert(*path, (k.as_bytes().to_vec(), v.as_bytes().to_vec()));
        }
        VirtualMap::new(range, Box::new(InMemoryDataSource::new(leaves)))
    }

    #[test]
    fn fully_clean_map_transfers_nothing_and_carries_every_leaf() {
        let hasher = Sha384Hasher;
        let range = LeafRange::new(16, 19);
        let previous = map_of(
            range,
            &[(16, "a", "1"), (17, "b", "2"), (18, "c", "3"), (19, "d", "4")],
        );
        let current = map_of(
            range,
            &[(16, "a", "1"), (17, "b", "2"), (18, "c", "3"), (19, "d", "4")],
        );

        let teacher = VirtualTeacher::new(&current, Some(&previous), &hasher);
        let mut learner = VirtualLearner::new(range, Some(&previous)).unwrap();
        run_in_process(&mut learner, &teacher).unwrap();

        let result = learner.finish().unwrap();
        assert_eq!(
            result.leaf_value(16).unwrap(),
            Some((b"a".to_vec(), b"1".to_vec()))
        );
    }

    #[test]
    fn dirty_leaf_is_transferred_and_reflected_in_the_result() {
        let hasher = Sha384Hasher;
        let range = LeafRange::new(16, 19);
        let previous = map_of(
            range,
            &[(16, "a", "1"), (17, "b", "2"), (18, "c", "3"), (19, "d", "4")],
        );
        let current = map_of(
            range,
            &[(16, "a", "99"), (17, "b", "2"), (18, "c", "3"), (19, "d", "4")],
        );

        let teacher = VirtualTeacher::new(&current, Some(&previous), &hasher);
        let mut learner = VirtualLearner::new(range, Some(&previous)).unwrap();
        run_in_process(&mut learner, &teacher).unwrap();

        let result = learner.finish().unwrap();
        assert_eq!(
            result.leaf_value(16).unwrap(),
            Some((b"a".to_vec(), b"99".to_vec()))
        );
        assert_eq!(
            result.leaf_value(17).unwrap(),
            Some((b"b".to_vec(), b"2".to_vec()))
        );
    }

    #[test]
    fn no_previous_round_forces_a_full_transfer() {
        let hasher = Sha384Hasher;
        let range = LeafRange::new(16, 19);
        let current = map_of(
            range,
            &[(16, "a", "1"), (17, "b", "2"), (18, "c", "3"), (19, "d", "4")],
        );

        let teacher = VirtualTeacher::new(&current, None, &hasher);
        let mut learner = VirtualLearner::new(range, None).unwrap();
        run_in_process(&mut learner, &teacher).unwrap();

        let result = learner.finish().unwrap();
        for path in 16..=19 {
            assert!(result.leaf_value(path).unwrap().is_some());
        }
    }
}
