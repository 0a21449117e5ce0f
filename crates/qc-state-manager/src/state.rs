//! Signed State: an immutable Merkle root for one round, accumulating
//! signatures toward a weight threshold (spec.md §3 "Signed State").

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use qc_merkle::MerkleTree;
use shared_crypto::Ed25519Signature;
use shared_types::{Hash, NodeId, Roster};

/// One round's signed state: the Merkle root hashed at submission time,
/// the roster it was signed against, and the signatures collected so far.
///
/// `tree`'s own reservation count (spec.md §4.7) is what reservation
/// guards reserve/release against; this struct adds the round bookkeeping
/// and signature table spec.md §4.10 layers on top of a bare Merkle tree.
pub struct SignedState {
    round: u64,
    tree: MerkleTree,
    roster: Roster,
    hash: Hash,
    signatures: RwLock<HashMap<NodeId, Ed25519Signature>>,
    weight_signed: AtomicU64,
    complete: AtomicBool,
}

impl SignedState {
    pub(crate) fn new(round: u64, tree: MerkleTree, roster: Roster, hash: Hash) -> Self {
        Self {
            round,
            tree,
            roster,
            hash,
            signatures: RwLock::new(HashMap::new()),
            weight_signed: AtomicU64::new(0),
            complete: AtomicBool::new(false),
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn signed_weight(&self) -> u64 {
        self.weight_signed.load(Ordering::Acquire)
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.read().len()
    }

    pub fn has_signed(&self, node_id: NodeId) -> bool {
        self.signatures.read().contains_key(&node_id)
    }

    /// Records a signature already verified by the caller. Returns `false`
    /// if `node_id` had already signed (signatures are not double-counted
    /// toward the weighted threshold).
    pub(crate) fn record_signature(&self, node_id: NodeId, signature: Ed25519Signature) -> bool {
        let mut signatures = self.signatures.write();
        if signatures.contains_key(&node_id) {
            return false;
        }
        signatures.insert(node_id, signature);
        drop(signatures);
        self.weight_signed
            .fetch_add(self.roster.weight_of(node_id), Ordering::AcqRel);
        true
    }

    /// Crosses the threshold iff not already marked complete. Returns
    /// whether this call is the one that made it complete (callers use
    /// this to fire the "latest complete" notification exactly once).
    pub(crate) fn try_mark_complete(&self, numerator: u64, denominator: u64) -> bool {
        if self.complete.load(Ordering::Acquire) {
            return false;
        }
        let total = self.roster.total_weight();
        let signed = self.weight_signed.load(Ordering::Acquire);
        if total > 0 && signed.saturating_mul(denominator) >= total.saturating_mul(numerator) {
            !self.complete.swap(true, Ordering::AcqRel)
        } else {
            false
        }
    }
}
