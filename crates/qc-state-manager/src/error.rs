//! Signed-state manager error types, spec.md §4.10, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateManagerError {
    /// A stale round was submitted (spec.md §7 `OutOfOrderState`): its
    /// round number is below the round that became immutable when a
    /// later round superseded it. The caller is responsible for dropping
    /// any reservation it was holding on its own copy of that round.
    #[error("out-of-order state: round {round} < latest immutable {latest_immutable}")]
    OutOfOrderState { round: u64, latest_immutable: u64 },

    /// `add_signature`/`reserve` named a round this manager has never
    /// held, or has since evicted.
    #[error("unknown or evicted round {round}")]
    UnknownRound { round: u64 },

    /// The signing node does not appear in that round's roster snapshot.
    #[error("node {node_id} is not a member of round {round}'s roster")]
    UnknownSigner { round: u64, node_id: u64 },

    /// A hash or signature-verification failure (spec.md §4.10 "Failure
    /// semantics": "a hash or signature-verification failure surfaces a
    /// fatal error to the host").
    #[error("fatal invariant violation: {0}")]
    Fatal(String),

    #[error("merkle reservation error: {0}")]
    Merkle(#[from] qc_merkle::MerkleError),
}
