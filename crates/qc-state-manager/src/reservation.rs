//! Named, scoped reservations on a [`crate::SignedState`]'s underlying
//! Merkle tree (spec.md §4.10 "Reservation discipline").
//!
//! A reservation's *tag* is a human string (e.g. `"gossip-tips"`,
//! `"reconnect-teacher"`) carried purely for leak diagnostics — it plays no
//! role in counting. Dropping a [`ReservedSignedState`] does not release
//! the underlying tree inline; it hands the release off to the background
//! [`crate::GarbageCollector`] so a deep recursive Merkle release never
//! runs on whatever thread happened to drop the last handle (spec.md §4.10
//! "A background collector thread releases states whose reservation count
//! has dropped to zero, on a bounded queue").

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::state::SignedState;

/// One release obligation handed to the [`crate::GarbageCollector`].
pub struct ReleaseTicket {
    pub(crate) round: u64,
    pub(crate) state: Arc<SignedState>,
    pub(crate) reservation_id: u64,
}

/// Bookkeeping the sentinel scans for leak diagnostics (spec.md §6
/// `state.sentinel_leak_ttl`). Never consulted for correctness — only for
/// the diagnostic sweep.
pub(crate) struct ReservationRecord {
    pub round: u64,
    pub tag: String,
    pub acquired_at: Instant,
}

/// A scoped hold on a signed state's Merkle tree. Reserving increments the
/// tree's atomic reservation counter (spec.md §4.7); dropping this guard
/// queues the matching release with the background collector instead of
/// releasing inline.
pub struct ReservedSignedState {
    state: Arc<SignedState>,
    reservation_id: u64,
    tag: String,
    release_tx: mpsc::Sender<ReleaseTicket>,
}

impl ReservedSignedState {
    pub(crate) fn new(
        state: Arc<SignedState>,
        reservation_id: u64,
        tag: String,
        release_tx: mpsc::Sender<ReleaseTicket>,
    ) -> Self {
        state.tree().reserve();
        Self {
            state,
            reservation_id,
            tag,
            release_tx,
        }
    }

    pub fn round(&self) -> u64 {
        self.state.round()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> &Arc<SignedState> {
        &self.state
    }

    pub(crate) fn reservation_id(&self) -> u64 {
        self.reservation_id
    }
}

impl Drop for ReservedSignedState {
    fn drop(&mut self) {
        let ticket = ReleaseTicket {
            round: self.state.round(),
            state: self.state.clone(),
            reservation_id: self.reservation_id,
        };
        // `try_send` rather than blocking: `Drop` cannot await. A full or
        // closed queue means the collector is gone or overwhelmed; release
        // inline rather than leak the tree's reservation count.
        if let Err(err) = self.release_tx.try_send(ticket) {
            tracing::warn!(
                round = self.state.round(),
                tag = %self.tag,
                "release queue unavailable, releasing reservation inline"
            );
            let state = match err {
                mpsc::error::TrySendError::Full(t) => t.state,
                mpsc::error::TrySendError::Closed(t) => t.state,
            };
            if let Err(release_err) = state.tree().release() {
                tracing::error!(error = %release_err, round = state.round(), "inline reservation release failed");
            }
        }
    }
}
