//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key seed")]
    InvalidPrivateKey,

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("invalid signature encoding")]
    InvalidSignatureFormat,
}
