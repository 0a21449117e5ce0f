//! Gossip-session error types, spec.md §7.

use thiserror::Error;

/// Why a session landed in the terminal `ABORT` state (spec.md §4.5).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("roster epoch mismatch: ours {ours}, theirs {theirs}")]
    EpochMismatch { ours: u64, theirs: u64 },

    #[error("peer violated the session protocol")]
    ProtocolViolation,

    #[error("session deadline exceeded")]
    Timeout,

    #[error("an incoming event failed validation")]
    InvalidEvent,

    #[error("the operator requested cancellation")]
    OperatorCancelled,

    #[error("transport failure: {0}")]
    Transport(TransportFailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    Closed,
    Io,
}

impl std::fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportFailureKind::Closed => write!(f, "closed"),
            TransportFailureKind::Io => write!(f, "io error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("frame decode error: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("wire encode/decode error: {0}")]
    Wire(#[from] qc_event_core::wire::WireError),

    #[error("session aborted: {0}")]
    Aborted(AbortReason),
}
