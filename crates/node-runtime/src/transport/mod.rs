//! Transport selection: plain TCP by default, mTLS-over-QUIC behind the
//! `mtls` feature (spec.md §6 "TLS handshake").

#[cfg(feature = "mtls")]
pub mod mtls;
