//! Roster: the authoritative, weighted node membership list.
//!
//! Reference: spec.md §3 (Roster), §4.6 (Peer Identification), GLOSSARY.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

/// Consensus weight. Zero-weight nodes are valid roster members (see
/// spec.md §4.2 "zero-weight inclusion") but contribute nothing to
/// advancement scores or signature thresholds.
pub type Weight = u64;

/// One roster member: identity, weight, and the credentials needed to
/// authenticate and reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub node_id: NodeId,
    pub weight: Weight,
    /// DER-encoded signing certificate, matched against presented agreement
    /// certs during the mTLS handshake (spec.md §4.6).
    pub signing_cert: Vec<u8>,
    /// Ed25519 public key used to verify event signatures (spec.md §4.1).
    pub public_key: [u8; 32],
    /// Network address nodes dial to open a gossip session.
    pub gossip_endpoint: String,
}

/// An ordered, immutable roster snapshot.
///
/// Reference: spec.md §5 ("Roster snapshots are immutable once published;
/// writers publish a new snapshot atomically"). Callers hold an `Arc<Roster>`
/// and swap it wholesale rather than mutating members in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Epoch/round at which this roster snapshot became authoritative.
    pub epoch: u64,
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(epoch: u64, mut entries: Vec<RosterEntry>) -> Self {
        entries.sort_by_key(|e| e.node_id);
        Self { epoch, entries }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, node_id: NodeId) -> Option<&RosterEntry> {
        self.entries
            .binary_search_by_key(&node_id, |e| e.node_id)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.get(node_id).is_some()
    }

    /// This node's dense position within the roster's entry list, used for
    /// arena-indexed tipsets (spec.md §9 "index by dense integers").
    pub fn position_of(&self, node_id: NodeId) -> Option<usize> {
        self.entries.binary_search_by_key(&node_id, |e| e.node_id).ok()
    }

    pub fn weight_of(&self, node_id: NodeId) -> Weight {
        self.get(node_id).map(|e| e.weight).unwrap_or(0)
    }

    pub fn total_weight(&self) -> Weight {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Find the roster entry whose signing certificate matches the given
    /// certificate issuer bytes. Used by peer identification (spec.md §4.6).
    pub fn find_by_signing_cert(&self, cert: &[u8]) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.signing_cert == cert)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter()
    }
}
