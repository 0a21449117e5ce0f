//! Garbage Collector: background release of dropped reservations (spec.md
//! §4.10 "Reservation discipline" / System Overview "Garbage Collector").
//!
//! Runs as a [`shared_bus::Scheduler::Sequential`] pump over the manager's
//! release queue — one handler task draining [`ReleaseTicket`]s in arrival
//! order, matching how this workspace's other single-purpose queues are
//! drained (`qc-shadow-graph`'s eviction, `qc-reconnect`'s IO actor).

use std::sync::Arc;

use shared_bus::{Pump, Scheduler};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::manager::Inner;
use crate::reservation::ReleaseTicket;

/// Owns the manager's release queue for its lifetime. Dropping the
/// [`SignedStateManager`](crate::SignedStateManager) that created the
/// paired sender eventually closes the channel, which stops the pump.
pub struct GarbageCollector {
    handle: JoinHandle<()>,
}

impl GarbageCollector {
    pub(crate) fn spawn(inner: Arc<Inner>, release_rx: mpsc::Receiver<ReleaseTicket>) -> Self {
        let pump = Pump::new(Scheduler::Sequential, release_rx);
        let handle = pump.spawn(move |ticket: ReleaseTicket| {
            let inner = inner.clone();
            async move { inner.finalize_release(ticket) }
        });
        Self { handle }
    }

    /// Aborts the pump immediately. Only for shutdown paths — ordinarily
    /// the pump stops on its own once the manager (and every clone of it)
    /// is dropped.
    pub fn abort(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateManagerConfig;
    use crate::traits::{NoopConsumer, NoopSink};
    use crate::SignedStateManager;
    use qc_merkle::MerkleNode;
    use shared_crypto::Sha384Hasher;
    use shared_types::Roster;
    use std::time::Duration;

    #[tokio::test]
    async fn dropped_reservation_is_released_in_the_background() {
        let (manager, release_rx) = SignedStateManager::new(
            StateManagerConfig::default(),
            Arc::new(Sha384Hasher),
            Arc::new(NoopConsumer),
            Arc::new(NoopSink),
        );
        let _collector = manager.spawn_collector(release_rx);

        let tree = qc_merkle::MerkleTree::new(MerkleNode::leaf(0, b"k".to_vec(), b"v".to_vec()));
        let state = manager.submit_round(1, tree, Roster::new(0, vec![])).unwrap();
        let root = state.tree().root();

        let reservation = manager.reserve(1, "test").unwrap();
        assert_eq!(root.reservation_count(), 2); // table + this reservation
        drop(reservation);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(root.reservation_count(), 1, "background collector should have released it");
    }
}
