//! Merkle-tree error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("mutation attempted on a node marked immutable at path {path}")]
    Immutable { path: u64 },

    #[error("reservation count underflow at path {path}: released more times than reserved")]
    ReservationUnderflow { path: u64 },

    #[error("virtual map path {path} is outside the active leaf range {first}..={last}")]
    OutOfRange { path: u64, first: u64, last: u64 },
}
