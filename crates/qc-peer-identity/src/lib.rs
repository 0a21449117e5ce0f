//! # Peer Identity — Authenticated Gossip (spec.md §4.6)
//!
//! Maps a freshly accepted inbound TLS connection's presented agreement
//! certificate to the `PeerInfo` of the roster member that issued it,
//! over an atomically-refreshable trust-store snapshot.

pub mod error;
pub mod identify;
pub mod trust_store;

pub use error::PeerIdentityError;
pub use identify::PeerIdentifier;
pub use trust_store::TrustStore;
