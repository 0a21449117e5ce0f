//! spec.md §8 property 5 ("Reconnect hash match"): a learner completing
//! reconnect against a teacher's virtual-map subtree holds a tree whose
//! computed root hash equals the teacher's, exercised over a real framed
//! transport end to end (`qc-gossip` + `qc-reconnect` + `qc-merkle` +
//! `qc-traversal`).

use std::collections::HashMap;
use std::sync::Arc;

use qc_gossip::FrameTransport;
use qc_merkle::{DataSource, LeafRange, VirtualMap};
use qc_reconnect::{run_learner_with_prior_virtual, run_teacher, LearnedSubtree, NoPriorSnapshot, PendingRoot, ReconnectConfig};
use shared_bus::CancellationToken;
use shared_crypto::{Hasher, Sha384Hasher};
use shared_types::Hash;

const FIRST_LEAF: u64 = 1024;
const LAST_LEAF: u64 = 2047;
const SUBTREE_PATH: u64 = 1;

struct FixedDataSource {
    leaves: HashMap<u64, (Vec<u8>, Vec<u8>)>,
}

impl DataSource for FixedDataSource {
    fn leaf_hash(&self, path: u64) -> Option<Hash> {
        self.leaves.get(&path).map(|(k, v)| Sha384Hasher.hash_many(&[k, v]))
    }

    fn leaf_value(&self, path: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        self.leaves.get(&path).cloned()
    }
}

/// Every leaf set to `value_for(path, generation)`; half the leaves (even
/// paths) get a bumped generation, mirroring the scenario's "50% random
/// dirty leaves" without pulling in a `rand` dependency for determinism.
fn leaves_for(generation: u8) -> HashMap<u64, (Vec<u8>, Vec<u8>)> {
    let mut leaves = HashMap::new();
    for path in FIRST_LEAF..=LAST_LEAF {
        let gen = if path % 2 == 0 { generation } else { 0 };
        let key = format!("leaf-{path}").into_bytes();
        let value = format!("gen-{gen}").into_bytes();
        leaves.insert(path, (key, value));
    }
    leaves
}

fn root_hash(map: &VirtualMap, path: u64, hasher: &dyn Hasher) -> Hash {
    if map.range().contains(path) {
        return map.leaf_hash(path).unwrap().expect("leaf present in range");
    }
    let left = root_hash(map, path * 2, hasher);
    let right = root_hash(map, path * 2 + 1, hasher);
    hasher.hash_many(&[left.as_bytes(), right.as_bytes()])
}

#[tokio::test]
async fn learner_root_hash_matches_teacher_after_reconnect() {
    let range = LeafRange::new(FIRST_LEAF, LAST_LEAF);
    let hasher: Arc<dyn Hasher> = Arc::new(Sha384Hasher);

    // The learner's prior round: every leaf at generation 0.
    let previous_for_teacher = Arc::new(VirtualMap::new(range, Box::new(FixedDataSource { leaves: leaves_for(0) })));
    let previous_for_learner = previous_for_teacher.clone();

    // The teacher's current round: half the leaves bumped to generation 1.
    let current = Arc::new(VirtualMap::new(range, Box::new(FixedDataSource { leaves: leaves_for(1) })));
    let expected_root = root_hash(&current, SUBTREE_PATH, &*hasher);

    let (learner_stream, teacher_stream) = tokio::io::duplex(64 * 1024);
    let teacher_transport = FrameTransport::new(teacher_stream);
    let learner_transport = FrameTransport::new(learner_stream);

    let teacher_roots = vec![PendingRoot::virtual_map(SUBTREE_PATH, current, Some(previous_for_teacher))];
    let prior_virtual: Arc<dyn Fn(u64) -> Option<Arc<VirtualMap>> + Send + Sync> =
        Arc::new(move |path| (path == SUBTREE_PATH).then(|| previous_for_learner.clone()));

    let teacher_task = tokio::spawn(run_teacher(
        teacher_transport,
        teacher_roots,
        hasher.clone(),
        ReconnectConfig::default(),
        CancellationToken::new(),
    ));
    let learner_task = tokio::spawn(run_learner_with_prior_virtual(
        learner_transport,
        Arc::new(NoPriorSnapshot),
        prior_virtual,
        hasher.clone(),
        ReconnectConfig::default(),
        CancellationToken::new(),
    ));

    let (teacher_result, learner_result) = tokio::join!(teacher_task, learner_task);
    teacher_result.expect("teacher task did not panic").expect("teacher session succeeded");
    let subtrees = learner_result.expect("learner task did not panic").expect("learner session succeeded");

    let learned_map = subtrees
        .into_iter()
        .find_map(|subtree| match subtree {
            LearnedSubtree::Virtual { path, map } if path == SUBTREE_PATH => Some(map),
            _ => None,
        })
        .expect("learner reconstructed the virtual-map subtree");

    let learned_root = root_hash(&learned_map, SUBTREE_PATH, &*hasher);
    assert_eq!(learned_root, expected_root);
}
