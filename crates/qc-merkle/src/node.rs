//! Merkle Node: internal/leaf abstraction with reservation counts and an
//! immutability flag, spec.md §3 "Merkle Node", §4.7.
//!
//! Reservation counters are `AtomicU64` (spec.md §5: "Merkle reservations
//! are atomic counters"); releasing a node whose count reaches zero walks
//! its children outside any lock, matching the teacher's discipline of
//! releasing child resources outside a parent's critical section (spec.md
//! §5, §9 "Scoped resources").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use shared_crypto::Hasher;
use shared_types::Hash;

use crate::error::MerkleError;

/// Either an internal fork or a leaf payload.
enum NodeKind {
    Leaf {
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Internal {
        left: Arc<MerkleNode>,
        right: Arc<MerkleNode>,
    },
}

/// One node in a Merkle tree embedding. Cheaply shared via `Arc`; mutation
/// methods are blocked once [`MerkleNode::immutable`] is set (spec.md §4.7
/// "Immutable flag, once set, permanently blocks mutations").
pub struct MerkleNode {
    /// Path index in the complete binary embedding (spec.md §3, §4.9).
    path: u64,
    kind: RwLock<NodeKind>,
    hash: RwLock<Option<Hash>>,
    reservation: AtomicU64,
    immutable: AtomicBool,
    /// If set, reconnect delegates to this root's learner view instead of
    /// the default push view (spec.md §4.7, used by virtual maps).
    custom_reconnect: RwLock<Option<Arc<MerkleNode>>>,
}

impl MerkleNode {
    pub fn leaf(path: u64, key: Vec<u8>, value: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            path,
            kind: RwLock::new(NodeKind::Leaf { key, value }),
            hash: RwLock::new(None),
            reservation: AtomicU64::new(0),
            immutable: AtomicBool::new(false),
            custom_reconnect: RwLock::new(None),
        })
    }

    pub fn internal(path: u64, left: Arc<MerkleNode>, right: Arc<MerkleNode>) -> Arc<Self> {
        Arc::new(Self {
            path,
            kind: RwLock::new(NodeKind::Internal { left, right }),
            hash: RwLock::new(None),
            reservation: AtomicU64::new(0),
            immutable: AtomicBool::new(false),
            custom_reconnect: RwLock::new(None),
        })
    }

    pub fn path(&self) -> u64 {
        self.path
    }

    pub fn is_leaf(&self) -> bool {
        matches!(&*self.kind.read(), NodeKind::Leaf { .. })
    }

    pub fn reservation_count(&self) -> u64 {
        self.reservation.load(Ordering::Acquire)
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable.load(Ordering::Acquire)
    }

    /// Advertises `root` as this internal node's custom reconnect subtree
    /// view (spec.md §4.7, §4.8 "custom-reconnect internal node").
    pub fn set_custom_reconnect(&self, root: Arc<MerkleNode>) {
        *self.custom_reconnect.write() = Some(root);
    }

    pub fn custom_reconnect(&self) -> Option<Arc<MerkleNode>> {
        self.custom_reconnect.read().clone()
    }

    /// Left/right children, `None` for a leaf.
    pub fn children(&self) -> Option<(Arc<MerkleNode>, Arc<MerkleNode>)> {
        match &*self.kind.read() {
            NodeKind::Internal { left, right } => Some((left.clone(), right.clone())),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn leaf_key_value(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        match &*self.kind.read() {
            NodeKind::Leaf { key, value } => Some((key.clone(), value.clone())),
            NodeKind::Internal { .. } => None,
        }
    }

    /// Replaces a leaf's value in place, invalidating the cached hash.
    /// Rejected once [`MerkleNode::immutable`] is set.
    pub fn set_leaf_value(&self, value: Vec<u8>) -> Result<(), MerkleError> {
        if self.is_immutable() {
            return Err(MerkleError::Immutable { path: self.path });
        }
        match &mut *self.kind.write() {
            NodeKind::Leaf { value: v, .. } => *v = value,
            NodeKind::Internal { .. } => return Err(MerkleError::Immutable { path: self.path }),
        }
        *self.hash.write() = None;
        Ok(())
    }

    /// Replaces an internal node's children in place (used while a
    /// reconnect view reconstructs a subtree). Rejected once immutable.
    pub fn set_children(
        &self,
        left: Arc<MerkleNode>,
        right: Arc<MerkleNode>,
    ) -> Result<(), MerkleError> {
        if self.is_immutable() {
            return Err(MerkleError::Immutable { path: self.path });
        }
        match &mut *self.kind.write() {
            NodeKind::Internal { left: l, right: r } => {
                *l = left;
                *r = right;
            }
            NodeKind::Leaf { .. } => return Err(MerkleError::Immutable { path: self.path }),
        }
        *self.hash.write() = None;
        Ok(())
    }

    /// Computes (and caches) this node's hash, recursing into children.
    pub fn hash(&self, hasher: &dyn Hasher) -> Hash {
        if let Some(cached) = *self.hash.read() {
            return cached;
        }
        let computed = match &*self.kind.read() {
            NodeKind::Leaf { key, value } => hasher.hash_many(&[key, value]),
            NodeKind::Internal { left, right } => {
                let left_hash = left.hash(hasher);
                let right_hash = right.hash(hasher);
                hasher.hash_many(&[left_hash.as_bytes(), right_hash.as_bytes()])
            }
        };
        *self.hash.write() = Some(computed);
        computed
    }

    /// Increments the reservation count. Reference: spec.md §4.7 `reserve()`.
    pub fn reserve(&self) -> u64 {
        self.reservation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the reservation count; at zero, recursively releases
    /// children outside this node's own state (spec.md §4.7, §5).
    pub fn release(self: &Arc<Self>) -> Result<(), MerkleError> {
        let previous = self.reservation.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            if n == 0 {
                None
            } else {
                Some(n - 1)
            }
        });
        let Ok(previous) = previous else {
            return Err(MerkleError::ReservationUnderflow { path: self.path });
        };

        if previous == 1 {
            let children = self.children();
            if let Some((left, right)) = children {
                left.release()?;
                right.release()?;
            }
        }
        Ok(())
    }

    /// Produces a mutable shallow copy — children `Arc`s are shared, not
    /// deep-cloned — and permanently marks `self` immutable (spec.md §4.7
    /// `copy()`: "this is how round-over-round evolution produces a chain
    /// of signed states sharing unchanged sub-trees").
    pub fn copy(self: &Arc<Self>) -> Arc<MerkleNode> {
        let kind = match &*self.kind.read() {
            NodeKind::Leaf { key, value } => NodeKind::Leaf {
                key: key.clone(),
                value: value.clone(),
            },
            NodeKind::Internal { left, right } => NodeKind::Internal {
                left: left.clone(),
                right: right.clone(),
            },
        };
        let hash_snapshot = *self.hash.read();
        let custom_reconnect = self.custom_reconnect.read().clone();

        self.immutable.store(true, Ordering::Release);

        Arc::new(MerkleNode {
            path: self.path,
            kind: RwLock::new(kind),
            hash: RwLock::new(hash_snapshot),
            reservation: AtomicU64::new(0),
            immutable: AtomicBool::new(false),
            custom_reconnect: RwLock::new(custom_reconnect),
        })
    }
}
