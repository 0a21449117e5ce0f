//! Trust-store snapshot and atomic refresh, spec.md §4.6: "when the roster
//! changes, the server atomically swaps the trust-store view; in-flight
//! sessions continue against their original view."

use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::Roster;

/// Holds the current roster snapshot used to authenticate inbound
/// connections. Mirrors `TipsetTracker::set_roster`'s swap discipline:
/// writers publish a new `Arc<Roster>` wholesale, never mutate in place.
pub struct TrustStore {
    current: RwLock<Arc<Roster>>,
}

impl TrustStore {
    pub fn new(roster: Arc<Roster>) -> Self {
        Self {
            current: RwLock::new(roster),
        }
    }

    /// A snapshot of the roster as of this call. A session that accepted a
    /// connection against this snapshot keeps using it for its whole
    /// lifetime even if [`TrustStore::refresh`] is called afterward.
    pub fn snapshot(&self) -> Arc<Roster> {
        self.current.read().clone()
    }

    /// Atomically swaps in a new roster snapshot, e.g. on cert rotation or
    /// roster-transition completion.
    pub fn refresh(&self, roster: Arc<Roster>) {
        *self.current.write() = roster;
    }
}
