//! Peer-identification error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerIdentityError {
    #[error("presented certificate is empty")]
    EmptyCertificate,
}
