//! Reconnect error types, spec.md §4.8, §7.

use thiserror::Error;

/// Why a reconnect attempt (or a single view within one) failed terminally.
/// A single view's failure aborts the whole reconnect (spec.md §4.8: "one
/// view failing fails the reconnect"), so this is also the top-level error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("teacher did not answer within the per-poll deadline")]
    Timeout,
    #[error("teacher sent a node whose hash does not match its claimed content")]
    HashMismatch,
    #[error("teacher violated the reconnect stream protocol")]
    ProtocolViolation,
    #[error("the operator requested cancellation")]
    OperatorCancelled,
    #[error("transport closed before the reconnect finished")]
    TransportClosed,
}

#[derive(Debug, Error)]
pub enum ReconnectError {
    #[error("frame/message decode error: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("gossip envelope error: {0}")]
    Gossip(#[from] qc_gossip::GossipError),

    #[error("traversal error: {0}")]
    Traversal(#[from] qc_traversal::TraversalError),

    #[error("merkle error: {0}")]
    Merkle(#[from] qc_merkle::MerkleError),

    #[error("reconnect aborted: {0}")]
    Aborted(AbortReason),
}
