//! Leak Sentinel: periodically scans for reservations held past
//! `state.sentinel_leak_ttl` and emits a diagnostic event (spec.md §4.10
//! "Reservation discipline": "a sentinel periodically scans for leaked
//! reservations ... and emits a diagnostic event"). Never forces a release
//! (spec.md §5 "the sentinel logs violations but does not force release").

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::manager::Inner;

pub struct LeakSentinel {
    handle: JoinHandle<()>,
}

impl LeakSentinel {
    pub(crate) fn spawn(inner: Arc<Inner>, ttl: Duration, sweep_interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                for (round, tag, held) in inner.scan_leaks(ttl) {
                    #[cfg(feature = "metrics")]
                    crate::metrics::LEAKS_DETECTED_TOTAL.inc();
                    tracing::warn!(
                        round,
                        tag = %tag,
                        held_secs = held.as_secs(),
                        ttl_secs = ttl.as_secs(),
                        "reservation held past leak TTL"
                    );
                }
            }
        });
        Self { handle }
    }

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
    use std::sync::Arc as StdArc;

    #[tokio::test]
    async fn sentinel_does_not_release_a_leaked_reservation() {
        let mut config = StateManagerConfig::default();
        config.sentinel_leak_ttl = Duration::from_millis(10);
        config.sentinel_sweep_interval = Duration::from_millis(5);
        let (manager, _release_rx) = SignedStateManager::new(
            config.clone(),
            StdArc::new(Sha384Hasher),
            StdArc::new(NoopConsumer),
            StdArc::new(NoopSink),
        );

        let tree = qc_merkle::MerkleTree::new(MerkleNode::leaf(0, b"k".to_vec(), b"v".to_vec()));
        manager.submit_round(1, tree, Roster::new(0, vec![])).unwrap();
        let reservation = manager.reserve(1, "held-forever").unwrap();

        let sentinel = manager.spawn_sentinel(config.sentinel_leak_ttl, config.sentinel_sweep_interval);
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Still reserved: the sentinel only logs, it never force-releases.
        assert_eq!(reservation.state().tree().root().reservation_count(), 2);
        sentinel.abort();
    }
}
