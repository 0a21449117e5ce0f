//! Peer identification over a freshly accepted mTLS connection, spec.md
//! §4.6: match the presented agreement cert's issuer against each roster
//! member's signing-cert subject, over a snapshot of the current roster.

use std::time::Instant;

use shared_bus::RateLimiter;
use shared_types::RosterEntry;
use parking_lot::Mutex;

use crate::error::PeerIdentityError;
use crate::trust_store::TrustStore;

/// Identifies inbound peers against a [`TrustStore`] snapshot, rate
/// limiting the diagnostic log emitted for unmatched certs so a scan or a
/// misconfigured peer cannot flood logs (spec.md §4.6 "rate-limited
/// logging").
pub struct PeerIdentifier {
    trust_store: TrustStore,
    unmatched_log_limiter: Mutex<RateLimiter<Vec<u8>>>,
}

impl PeerIdentifier {
    pub fn new(trust_store: TrustStore) -> Self {
        Self {
            trust_store,
            unmatched_log_limiter: Mutex::new(RateLimiter::new(
                std::time::Duration::from_secs(60),
                5,
            )),
        }
    }

    /// Looks up the peer presenting `issuer_bytes` (the DER issuer field of
    /// the agreement cert) against a snapshot of the current roster. The
    /// snapshot is taken once here, so a concurrent [`TrustStore::refresh`]
    /// never changes the outcome of an in-flight call.
    pub fn identify(&self, issuer_bytes: &[u8]) -> Result<Option<RosterEntry>, PeerIdentityError> {
        if issuer_bytes.is_empty() {
            return Err(PeerIdentityError::EmptyCertificate);
        }

        let roster = self.trust_store.snapshot();
        match roster.find_by_signing_cert(issuer_bytes) {
            Some(entry) => Ok(Some(entry.clone())),
            None => {
                let allowed = self
                    .unmatched_log_limiter
                    .lock()
                    .allow(issuer_bytes.to_vec(), Instant::now());
                if allowed {
                    tracing::warn!(
                        issuer = %hex::encode(issuer_bytes),
                        "rejected TLS handshake: no roster member matches presented certificate issuer"
                    );
                }
                Ok(None)
            }
        }
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }
}
