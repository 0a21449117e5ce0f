//! Default push view: the reconnect protocol used for any subtree that has
//! not advertised a custom reconnect view (spec.md §4.7, §4.8). The learner
//! walks the subtree top-down; the teacher answers each node query with
//! either "clean" (the learner's last-seen hash still matches) or the
//! node's current hash and content, letting the learner recurse into
//! whichever children it doesn't already have.
//!
//! Synchronous by design, mirroring `qc_traversal::phase1::Phase1`: the
//! caller owns the actual request/response transport and feeds teacher
//! answers back in as they arrive.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use qc_merkle::MerkleNode;
use qc_traversal::plan::rank_of;
use shared_crypto::Hasher;
use shared_types::Hash;

use crate::error::AbortReason;
use crate::message::NodeContent;

/// What the learner already knows about a path from a previous round, so
/// the teacher can skip re-sending unchanged subtrees. `NoPriorSnapshot`
/// answers `None` everywhere, forcing a full cold transfer.
pub trait LearnerSnapshot: Send + Sync {
    fn hash_at(&self, path: u64) -> Option<Hash>;
    fn node_at(&self, path: u64) -> Option<Arc<MerkleNode>>;
}

pub struct NoPriorSnapshot;

impl LearnerSnapshot for NoPriorSnapshot {
    fn hash_at(&self, _path: u64) -> Option<Hash> {
        None
    }
    fn node_at(&self, _path: u64) -> Option<Arc<MerkleNode>> {
        None
    }
}

/// Locates the node at `target` within the tree rooted at `root`, following
/// `target`'s binary path one bit at a time (spec.md §3: path `p` has
/// children `2p`/`2p+1`).
pub fn locate_node(root: &Arc<MerkleNode>, target: u64) -> Option<Arc<MerkleNode>> {
    let root_path = root.path();
    if target == root_path {
        return Some(root.clone());
    }
    if target < root_path || rank_of(target) < rank_of(root_path) {
        return None;
    }
    let depth = rank_of(target) - rank_of(root_path);
    let mut node = root.clone();
    for i in (0..depth).rev() {
        let bit = (target >> i) & 1;
        let (left, right) = node.children()?;
        node = if bit == 0 { left } else { right };
    }
    (node.path() == target).then_some(node)
}

/// Teacher half: answers node queries against a fixed subtree root.
pub struct PushTeacher<'a> {
    root: Arc<MerkleNode>,
    hasher: &'a dyn Hasher,
}

pub enum NodeResponse {
    Clean,
    Dirty { hash: Hash, content: NodeContent },
}

impl<'a> PushTeacher<'a> {
    pub fn new(root: Arc<MerkleNode>, hasher: &'a dyn Hasher) -> Self {
        Self { root, hasher }
    }

    pub fn answer(&self, path: u64, known_hash: Option<Hash>) -> Option<NodeResponse> {
        let node = locate_node(&self.root, path)?;
        let hash = node.hash(self.hasher);
        if known_hash == Some(hash) {
            return Some(NodeResponse::Clean);
        }
        let content = match node.leaf_key_value() {
            Some((key, value)) => NodeContent::Leaf { key, value },
            None => {
                let (left, right) = node.children()?;
                NodeContent::Internal {
                    left_hash: left.hash(self.hasher),
                    right_hash: right.hash(self.hasher),
                }
            }
        };
        Some(NodeResponse::Dirty { hash, content })
    }
}

struct PendingInternal {
    left_path: u64,
    right_path: u64,
    left: Option<Arc<MerkleNode>>,
    right: Option<Arc<MerkleNode>>,
    claimed_hash: Hash,
}

/// Learner half: drives the walk, reconstructing the subtree bottom-up as
/// leaves and fully-resolved internal nodes come back.
pub struct PushLearner<'a> {
    hasher: &'a dyn Hasher,
    snapshot: &'a dyn LearnerSnapshot,
    root_path: u64,
    queue: VecDeque<u64>,
    parent_of_path: HashMap<u64, u64>,
    pending_internal: HashMap<u64, PendingInternal>,
    resolved: HashMap<u64, Arc<MerkleNode>>,
}

impl<'a> PushLearner<'a> {
    pub fn new(root_path: u64, hasher: &'a dyn Hasher, snapshot: &'a dyn LearnerSnapshot) -> Self {
        Self {
            hasher,
            snapshot,
            root_path,
            queue: VecDeque::from([root_path]),
            parent_of_path: HashMap::new(),
            pending_internal: HashMap::new(),
            resolved: HashMap::new(),
        }
    }

    /// The next path to send a `NodeQuery` for, paired with the learner's
    /// last-known hash at that path (`None` means "never seen").
    pub fn next_request(&mut self) -> Option<(u64, Option<Hash>)> {
        let path = self.queue.pop_front()?;
        Some((path, self.snapshot.hash_at(path)))
    }

    pub fn is_done(&self) -> bool {
        self.resolved.contains_key(&self.root_path)
    }

    pub fn root(&self) -> Option<Arc<MerkleNode>> {
        self.resolved.get(&self.root_path).cloned()
    }

    pub fn handle_response(
        &mut self,
        path: u64,
        response: NodeResponse,
    ) -> Result<(), AbortReason> {
        match response {
            NodeResponse::Clean => {
                let node = self
                    .snapshot
                    .node_at(path)
                    .ok_or(AbortReason::ProtocolViolation)?;
                self.attach(path, node)
            }
            NodeResponse::Dirty { hash, content } => match content {
                NodeContent::Leaf { key, value } => {
                    let node = MerkleNode::leaf(path, key, value);
                    if node.hash(self.hasher) != hash {
                        return Err(AbortReason::HashMismatch);
                    }
                    self.attach(path, node)
                }
                NodeContent::Internal { left_hash, right_hash } => {
                    let left_path = path * 2;
                    let right_path = path * 2 + 1;
                    self.pending_internal.insert(
                        path,
                        PendingInternal {
                            left_path,
                            right_path,
                            left: None,
                            right: None,
                            claimed_hash: hash,
                        },
                    );
                    self.resolve_or_enqueue(path, left_path, left_hash)?;
                    self.resolve_or_enqueue(path, right_path, right_hash)
                }
            },
        }
    }

    fn resolve_or_enqueue(
        &mut self,
        parent_path: u64,
        child_path: u64,
        claimed_child_hash: Hash,
    ) -> Result<(), AbortReason> {
        self.parent_of_path.insert(child_path, parent_path);
        if self.snapshot.hash_at(child_path) == Some(claimed_child_hash) {
            if let Some(existing) = self.snapshot.node_at(child_path) {
                return self.attach(child_path, existing);
            }
        }
        self.queue.push_back(child_path);
        Ok(())
    }

    fn attach(&mut self, path: u64, node: Arc<MerkleNode>) -> Result<(), AbortReason> {
        self.resolved.insert(path, node.clone());
        let mut current_path = path;
        let mut current_node = node;
        loop {
            let Some(&parent_path) = self.parent_of_path.get(&current_path) else {
                break;
            };
            let Some(pending) = self.pending_internal.get_mut(&parent_path) else {
                break;
            };
            if current_path == pending.left_path {
                pending.left = Some(current_node.clone());
            } else {
                pending.right = Some(current_node.clone());
            }
            let (Some(left), Some(right)) = (pending.left.clone(), pending.right.clone()) else {
                break;
            };
            let claimed_hash = pending.claimed_hash;
            self.pending_internal.remove(&parent_path);

            let built = MerkleNode::internal(parent_path, left, right);
            if built.hash(self.hasher) != claimed_hash {
                return Err(AbortReason::HashMismatch);
            }
            self.resolved.insert(parent_path, built.clone());
            current_path = parent_path;
            current_node = built;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::Sha384Hasher;

    fn sample_tree() -> Arc<MerkleNode> {
        let a = MerkleNode::leaf(4, b"a".to_vec(), b"1".to_vec());
        let b = MerkleNode::leaf(5, b"b".to_vec(), b"2".to_vec());
        MerkleNode::internal(2, a, b)
    }

    fn drive(
        learner: &mut PushLearner,
        teacher: &PushTeacher,
    ) {
        while let Some((path, known_hash)) = learner.next_request() {
            let response = teacher.answer(path, known_hash).expect("teacher has this path");
            learner.handle_response(path, response).expect("no hash mismatch");
        }
    }

    #[test]
    fn cold_learner_reconstructs_the_whole_subtree() {
        let hasher = Sha384Hasher;
        let root = sample_tree();
        let teacher = PushTeacher::new(root.clone(), &hasher);
        let mut learner = PushLearner::new(2, &hasher, &NoPriorSnapshot);

        drive(&mut learner, &teacher);

        assert!(learner.is_done());
        let learned_root = learner.root().unwrap();
        assert_eq!(learned_root.hash(&hasher), root.hash(&hasher));
    }

    struct FixedSnapshot {
        nodes: HashMap<u64, Arc<MerkleNode>>,
    }

    impl LearnerSnapshot for FixedSnapshot {
        fn hash_at(&self, path: u64) -> Option<Hash> {
            self.nodes.get(&path).map(|n| n.hash(&Sha384Hasher))
        }
        fn node_at(&self, path: u64) -> Option<Arc<MerkleNode>> {
            self.nodes.get(&path).cloned()
        }
    }

    #[test]
    fn unchanged_leaf_is_reused_without_a_round_trip() {
        let hasher = Sha384Hasher;
        let unchanged_leaf = MerkleNode::leaf(5, b"b".to_vec(), b"2".to_vec());
        let changed_leaf = MerkleNode::leaf(4, b"a".to_vec(), b"1".to_vec());
        let root = MerkleNode::internal(2, changed_leaf, unchanged_leaf.clone());

        let mut prior = HashMap::new();
        prior.insert(5, unchanged_leaf);
        let snapshot = FixedSnapshot { nodes: prior };

        let teacher = PushTeacher::new(root.clone(), &hasher);
        let mut learner = PushLearner::new(2, &hasher, &snapshot);

        let mut queried_paths = Vec::new();
        while let Some((path, known_hash)) = learner.next_request() {
            queried_paths.push(path);
            let response = teacher.answer(path, known_hash).unwrap();
            learner.handle_response(path, response).unwrap();
        }

        assert!(learner.is_done());
        assert!(!queried_paths.contains(&5), "unchanged leaf must not be re-fetched");
        assert_eq!(learner.root().unwrap().hash(&hasher), root.hash(&hasher));
    }

    #[test]
    fn teacher_reports_clean_when_learner_already_has_the_hash() {
        let hasher = Sha384Hasher;
        let root = sample_tree();

        let mut prior = HashMap::new();
        prior.insert(2, root.clone());
        let snapshot = FixedSnapshot { nodes: prior };

        let teacher = PushTeacher::new(root.clone(), &hasher);
        let mut learner = PushLearner::new(2, &hasher, &snapshot);

        let (path, known_hash) = learner.next_request().unwrap();
        let response = teacher.answer(path, known_hash).unwrap();
        assert!(matches!(response, NodeResponse::Clean));
        learner.handle_response(path, response).unwrap();
        assert!(learner.is_done());
    }
}
