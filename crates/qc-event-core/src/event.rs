//! Event Model & Hashing, spec.md §4.1.

use shared_types::{Hash, NodeId, Roster, Timestamp};
use shared_crypto::{Ed25519KeyPair, Ed25519Signature, Hasher};

use crate::config::EventLimits;
use crate::descriptor::EventDescriptor;
use crate::error::{EventError, VerifyOutcome};
use crate::wire::{self, WireEvent, WireParent};

/// An immutable hashgraph event, spec.md §3.
#[derive(Debug, Clone)]
pub struct Event {
    pub creator: NodeId,
    pub self_parent: Option<EventDescriptor>,
    pub other_parents: Vec<EventDescriptor>,
    pub timestamp: Timestamp,
    pub transactions: Vec<Vec<u8>>,
    pub birth_round: u64,
    /// `1 + max(parent generations)`, or `0` with no parents. Never
    /// user-supplied (spec.md §4.1 "Generation is derived").
    pub generation: u64,
    pub hash: Hash,
    /// `None` until [`sign`] is called.
    pub signature: Option<Ed25519Signature>,
}

impl Event {
    /// Total size, in bytes, of this event's transaction payloads.
    pub fn transaction_bytes(&self) -> usize {
        self.transactions.iter().map(Vec::len).sum()
    }

    /// Number of transactions, used by the caller's timestamp-monotonicity
    /// arithmetic (spec.md §3: "one tx consumes ≥1 ns of the creator's
    /// timestamp budget").
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// The minimum timestamp a self-child of this event may carry.
    pub fn min_child_timestamp(&self) -> Timestamp {
        self.timestamp
            .plus_nanos(self.transaction_count().max(1) as u128)
    }

    pub fn descriptor(&self) -> EventDescriptor {
        EventDescriptor::new(self.hash, self.creator, self.birth_round, self.generation)
    }

    /// Projects this event onto the subset of fields the wire format
    /// carries, for handing to `qc_event_core::wire::encode_signed` (used
    /// by `qc-gossip`'s `TRANSFER` phase and `qc-reconnect`'s leaf
    /// transmission).
    pub fn to_wire(&self) -> WireEvent {
        WireEvent {
            creator: self.creator,
            self_parent: self.self_parent.map(descriptor_to_wire_parent),
            other_parents: self
                .other_parents
                .iter()
                .map(|d| descriptor_to_wire_parent(*d))
                .collect(),
            timestamp: self.timestamp,
            transactions: self.transactions.clone(),
            birth_round: self.birth_round,
            signature: self.signature.map(|s| s.as_bytes().to_vec()),
            hash: Some(self.hash),
        }
    }
}

fn descriptor_to_wire_parent(d: EventDescriptor) -> WireParent {
    WireParent {
        hash: d.hash,
        creator: d.creator,
        birth_round: d.birth_round,
    }
}

/// Builds a new event. `self_parent` is the creator's full prior event
/// (not just its descriptor) because monotonicity enforcement needs its
/// timestamp and transaction count (spec.md §3 invariant).
#[allow(clippy::too_many_arguments)]
pub fn build_event(
    creator: NodeId,
    self_parent: Option<&Event>,
    other_parents: Vec<EventDescriptor>,
    transactions: Vec<Vec<u8>>,
    birth_round: u64,
    timestamp: Timestamp,
    limits: &EventLimits,
    hasher: &dyn Hasher,
) -> Result<Event, EventError> {
    let total_tx_bytes: usize = transactions.iter().map(Vec::len).sum();
    if total_tx_bytes > limits.max_transaction_bytes {
        return Err(EventError::OversizedEvent {
            limit: limits.max_transaction_bytes,
            actual: total_tx_bytes,
        });
    }

    if let Some(parent) = self_parent {
        let minimum = parent.min_child_timestamp();
        if timestamp < minimum {
            return Err(EventError::InvalidTimestamp {
                creator,
                minimum,
                given: timestamp,
            });
        }
    }

    let self_parent_descriptor = self_parent.map(Event::descriptor);

    let generation = [
        self_parent_descriptor.map(|d| d.generation),
        other_parents.iter().map(|d| d.generation).max(),
    ]
    .into_iter()
    .flatten()
    .max()
    .map(|max_parent_generation| max_parent_generation + 1)
    .unwrap_or(0);

    let wire = WireEvent {
        creator,
        self_parent: self_parent_descriptor.map(descriptor_to_wire_parent),
        other_parents: other_parents.iter().map(|d| descriptor_to_wire_parent(*d)).collect(),
        timestamp,
        transactions: transactions.clone(),
        birth_round,
        signature: None,
        hash: None,
    };
    let unsigned_bytes = wire::encode_unsigned(&wire);
    let hash = hasher.hash(&unsigned_bytes);

    Ok(Event {
        creator,
        self_parent: self_parent_descriptor,
        other_parents,
        timestamp,
        transactions,
        birth_round,
        generation,
        hash,
        signature: None,
    })
}

/// Signs an event's hash with the creator's key pair.
pub fn sign(event: &mut Event, keypair: &Ed25519KeyPair) {
    event.signature = Some(keypair.sign(event.hash.as_bytes()));
}

/// Verifies an event's signature against the creator's registered signing
/// key in `roster` (spec.md §4.1).
pub fn verify(event: &Event, roster: &Roster) -> VerifyOutcome {
    let Some(entry) = roster.get(event.creator) else {
        return VerifyOutcome::UnknownCreator;
    };
    let Some(signature) = event.signature else {
        return VerifyOutcome::InvalidSignature;
    };
    let Ok(public_key) = shared_crypto::Ed25519PublicKey::from_bytes(entry.public_key) else {
        return VerifyOutcome::InvalidSignature;
    };
    match public_key.verify(event.hash.as_bytes(), &signature) {
        Ok(()) => VerifyOutcome::Ok,
        Err(_) => VerifyOutcome::InvalidSignature,
    }
}

/// Re-encodes `event` and recomputes its hash with `hasher`, for validating
/// events received off the wire before trusting their claimed hash.
pub fn recompute_hash(event: &Event, hasher: &dyn Hasher) -> Hash {
    let wire = event.to_wire();
    hasher.hash(&wire::encode_unsigned(&wire))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::Sha384Hasher;
    use shared_types::RosterEntry;

    fn hasher() -> Sha384Hasher {
        Sha384Hasher
    }

    fn genesis(creator: NodeId, ts: u128, txs: usize) -> Event {
        let transactions = (0..txs).map(|i| vec![i as u8]).collect();
        build_event(
            creator,
            None,
            vec![],
            transactions,
            1,
            Timestamp::from_nanos(ts),
            &EventLimits::default(),
            &hasher(),
        )
        .unwrap()
    }

    #[test]
    fn genesis_event_has_generation_zero() {
        let e = genesis(NodeId::new(0), 1_000, 0);
        assert_eq!(e.generation, 0);
        assert!(e.self_parent.is_none());
    }

    #[test]
    fn self_child_generation_is_parent_plus_one() {
        let parent = genesis(NodeId::new(0), 1_000_000_000, 5);
        let child = build_event(
            NodeId::new(0),
            Some(&parent),
            vec![],
            vec![],
            1,
            parent.min_child_timestamp(),
            &EventLimits::default(),
            &hasher(),
        )
        .unwrap();
        assert_eq!(child.generation, 1);
    }

    #[test]
    fn timestamp_before_minimum_is_rejected() {
        let parent = genesis(NodeId::new(0), 1_000_000_000, 5);
        let too_early = Timestamp::from_nanos(parent.timestamp.as_nanos() + 1);
        let result = build_event(
            NodeId::new(0),
            Some(&parent),
            vec![],
            vec![],
            1,
            too_early,
            &EventLimits::default(),
            &hasher(),
        );
        assert!(matches!(result, Err(EventError::InvalidTimestamp { .. })));
    }

    #[test]
    fn oversized_transactions_are_rejected() {
        let limits = EventLimits {
            max_transaction_bytes: 4,
        };
        let result = build_event(
            NodeId::new(0),
            None,
            vec![],
            vec![vec![0u8; 5]],
            1,
            Timestamp::from_nanos(1),
            &limits,
            &hasher(),
        );
        assert!(matches!(result, Err(EventError::OversizedEvent { .. })));
    }

    #[test]
    fn sign_then_verify_against_roster_succeeds() {
        let keypair = Ed25519KeyPair::generate();
        let entry = RosterEntry {
            node_id: NodeId::new(0),
            weight: 1,
            signing_cert: vec![],
            public_key: *keypair.public_key().as_bytes(),
            gossip_endpoint: "127.0.0.1:0".into(),
        };
        let roster = Roster::new(0, vec![entry]);

        let mut event = genesis(NodeId::new(0), 1, 0);
        sign(&mut event, &keypair);

        assert_eq!(verify(&event, &roster), VerifyOutcome::Ok);
    }

    #[test]
    fn verify_rejects_unknown_creator() {
        let roster = Roster::new(0, vec![]);
        let mut event = genesis(NodeId::new(0), 1, 0);
        sign(&mut event, &Ed25519KeyPair::generate());
        assert_eq!(verify(&event, &roster), VerifyOutcome::UnknownCreator);
    }

    #[test]
    fn verify_rejects_wrong_signature() {
        let signer = Ed25519KeyPair::generate();
        let impostor = Ed25519KeyPair::generate();
        let entry = RosterEntry {
            node_id: NodeId::new(0),
            weight: 1,
            signing_cert: vec![],
            public_key: *signer.public_key().as_bytes(),
            gossip_endpoint: "127.0.0.1:0".into(),
        };
        let roster = Roster::new(0, vec![entry]);

        let mut event = genesis(NodeId::new(0), 1, 0);
        sign(&mut event, &impostor);

        assert_eq!(verify(&event, &roster), VerifyOutcome::InvalidSignature);
    }

    #[test]
    fn hash_excludes_signature() {
        let mut event = genesis(NodeId::new(0), 1, 0);
        let hash_before = event.hash;
        sign(&mut event, &Ed25519KeyPair::generate());
        assert_eq!(event.hash, hash_before);
    }

    #[test]
    fn recompute_hash_matches_build_time_hash() {
        let event = genesis(NodeId::new(0), 1, 3);
        assert_eq!(recompute_hash(&event, &hasher()), event.hash);
    }
}
