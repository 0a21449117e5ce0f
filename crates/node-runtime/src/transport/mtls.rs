//! mTLS-over-QUIC transport: the server identifies a peer by matching the
//! presented agreement cert's issuer to a known signing cert in the roster
//! snapshot.
//!
//! Currently a config struct plus connection state, built on
//! `quinn`/`rustls`/`rcgen`. Unlike the plain-TCP path `wiring::gossip` uses
//! by default, wiring a `rustls::server::danger::ClientCertVerifier` that
//! delegates into `qc_peer_identity::PeerIdentifier` and adapting a `quinn`
//! bidirectional stream pair into one `AsyncRead + AsyncWrite` type is the
//! next piece of this module, not yet built — see DESIGN.md for why the
//! split exists.

use std::net::SocketAddr;
use std::time::Duration;

/// QUIC endpoint configuration for the mTLS gossip/reconnect transport.
#[derive(Debug, Clone)]
pub struct MtlsConfig {
    pub listen_addr: SocketAddr,
    pub handshake_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for MtlsConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:30303".parse().unwrap(),
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
        }
    }
}
