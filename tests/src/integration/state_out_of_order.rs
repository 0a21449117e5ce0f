//! spec.md §8 property 9 ("Out-of-order state rejection"): submitting round
//! R+1 then R+2 then R accepts the first two and rejects R with
//! `OutOfOrderState`. Spans `qc-state-manager` driving a real
//! `qc-merkle::MerkleTree` end to end, so it's covered here rather than
//! solely as a `qc-state-manager` unit test.

use std::sync::Arc;

use qc_merkle::{MerkleNode, MerkleTree};
use qc_state_manager::{NoopConsumer, NoopSink, SignedStateManager, StateManagerConfig, StateManagerError};
use shared_crypto::Sha384Hasher;
use shared_types::{NodeId, Roster, RosterEntry};

fn roster() -> Roster {
    Roster::new(
        1,
        vec![RosterEntry {
            node_id: NodeId::new(0),
            weight: 1,
            signing_cert: Vec::new(),
            public_key: [0u8; 32],
            gossip_endpoint: "127.0.0.1:0".to_string(),
        }],
    )
}

fn tree_for(round: u64) -> MerkleTree {
    MerkleTree::new(MerkleNode::leaf(0, b"round".to_vec(), round.to_be_bytes().to_vec()))
}

#[tokio::test]
async fn stale_round_is_rejected_once_a_successor_has_landed() {
    let (manager, _release_rx) = SignedStateManager::new(
        StateManagerConfig::default(),
        Arc::new(Sha384Hasher),
        Arc::new(NoopConsumer),
        Arc::new(NoopSink),
    );

    manager.submit_round(10, tree_for(10), roster()).expect("round 10 accepted");
    manager.submit_round(11, tree_for(11), roster()).expect("round 11 accepted, bumps the immutable floor to 10");

    let rejected = manager.submit_round(9, tree_for(9), roster());
    assert!(matches!(
        rejected,
        Err(StateManagerError::OutOfOrderState { round: 9, latest_immutable: 10 })
    ));
}
