//! Error kinds surfaced at the core boundary.
//!
//! Individual crates define their own `thiserror`-derived error enums for
//! internal detail; each maps into one of these kinds when crossing a
//! component boundary.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Error kinds any compliant subsystem surfaces at its boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Signature, hash, or parent-resolution check failed on an incoming event.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Event (or parent reference) is older than the current ancient threshold.
    #[error("event is ancient")]
    Ancient,

    /// Event already present in the shadow graph.
    #[error("duplicate event")]
    Duplicate,

    /// Peer roster epoch/software version incompatible.
    #[error("roster epoch mismatch: ours {ours}, theirs {theirs}")]
    EpochMismatch { ours: u64, theirs: u64 },

    /// Peer violated the session protocol (out-of-order, oversized, over backpressure window).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A deadline was exceeded.
    #[error("operation timed out")]
    Timeout,

    /// A stale round was submitted to the signed-state manager.
    #[error("out-of-order state: round {round} < latest immutable {latest_immutable}")]
    OutOfOrderState { round: u64, latest_immutable: u64 },

    /// Reconnect's reconstructed tree hash did not match the teacher's advertised root hash.
    #[error("reconnect hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    /// A reservation was held past its configured leak TTL.
    #[error("reservation leak: tag {tag} held {held_secs}s (ttl {ttl_secs}s)")]
    ReservationLeak {
        tag: String,
        held_secs: u64,
        ttl_secs: u64,
    },

    /// An invariant violation with no recovery; the host should terminate.
    #[error("fatal invariant violation: {0}")]
    Fatal(String),
}

impl CoreError {
    /// Whether this error should abort only the enclosing session/operation
    /// (`true`) or is fatal to the whole node (`false`). Mirrors spec.md §7's
    /// propagation policy.
    pub fn is_session_scoped(&self) -> bool {
        !matches!(self, CoreError::Fatal(_) | CoreError::HashMismatch { .. })
    }
}
