//! Event-core error types.

use shared_types::{NodeId, Timestamp};
use thiserror::Error;

/// Failures from [`crate::event::build_event`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("event timestamp {given:?} for creator {creator:?} is before the required minimum {minimum:?}")]
    InvalidTimestamp {
        creator: NodeId,
        minimum: Timestamp,
        given: Timestamp,
    },

    #[error("event has {actual} transaction bytes, exceeding the {limit} byte bound")]
    OversizedEvent { limit: usize, actual: usize },

    #[error("wire encoding error: {0}")]
    Wire(#[from] crate::wire::WireError),
}

/// Outcome of [`crate::event::verify`], spec.md §4.1: `Ok | InvalidSignature
/// | UnknownCreator`. Modeled as a plain enum rather than a `Result` because
/// all three are expected outcomes of routine verification, not exceptional
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ok,
    InvalidSignature,
    UnknownCreator,
}

impl VerifyOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyOutcome::Ok)
    }
}
