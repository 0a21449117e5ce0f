//! # Gossip — Per-Peer Session Protocol
//!
//! Drives one peer connection through `HANDSHAKE -> TIP_EXCHANGE -> DIFF ->
//! TRANSFER -> COMMIT` (or `ABORT` from any state), spec.md §4.5. Transport
//! is generic over anything implementing `tokio::io::{AsyncRead,
//! AsyncWrite}`; dialing, TLS, and peer identification happen one layer up,
//! in `qc-peer-identity` and `node-runtime`.

pub mod backoff;
pub mod config;
pub mod error;
pub mod frame;
pub mod payload;
pub mod session;
pub mod transport;

pub use backoff::RedialBackoff;
pub use config::GossipConfig;
pub use error::{AbortReason, GossipError, TransportFailureKind};
pub use frame::{Frame, GOSSIP_VIEW_ID, TERMINATE_VIEW_ID};
pub use payload::{Payload, TipAdvert};
pub use session::{GossipSession, SessionOutcome};
pub use transport::FrameTransport;
