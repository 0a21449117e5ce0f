//! Signed-State Manager: per-round pipeline, signature collection, and the
//! reservation table the background collector and sentinel act on (spec.md
//! §4.10).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use qc_merkle::MerkleTree;
use shared_crypto::{Ed25519PublicKey, Ed25519Signature, Hasher};
use shared_types::{NodeId, Roster};
use tokio::sync::mpsc;

use crate::collector::GarbageCollector;
use crate::config::StateManagerConfig;
use crate::error::StateManagerError;
use crate::reservation::{ReleaseTicket, ReservationRecord, ReservedSignedState};
use crate::sentinel::LeakSentinel;
use crate::state::SignedState;
use crate::traits::{CompleteStateConsumer, StateSink};

#[cfg(feature = "metrics")]
use crate::metrics;

const TABLE_RESERVATION_TAG: &str = "state-table";

pub(crate) struct Inner {
    states: RwLock<BTreeMap<u64, Arc<SignedState>>>,
    table_reservation_ids: RwLock<HashMap<u64, u64>>,
    /// Round most recently inserted, regardless of ordering (spec.md §9
    /// "a new round's Merkle root" stamped on arrival).
    current_latest_round: RwLock<Option<u64>>,
    /// The round that became immutable the last time a strictly greater
    /// round arrived — see DESIGN.md for why this, not "max round ever
    /// seen", is the floor `OutOfOrderState` checks against (spec.md §8
    /// property 9).
    latest_immutable_round: AtomicU64,
    latest_complete: RwLock<Option<Arc<SignedState>>>,
    reservations: RwLock<HashMap<u64, ReservationRecord>>,
    next_reservation_id: AtomicU64,
    release_tx: mpsc::Sender<ReleaseTicket>,
    hasher: Arc<dyn Hasher>,
    config: StateManagerConfig,
    consumer: Arc<dyn CompleteStateConsumer>,
    sink: Arc<dyn StateSink>,
}

impl Inner {
    fn reserve_internal(self: &Arc<Self>, state: &Arc<SignedState>, tag: &str) -> ReservedSignedState {
        let id = self.next_reservation_id.fetch_add(1, Ordering::Relaxed);
        self.reservations.write().insert(
            id,
            ReservationRecord {
                round: state.round(),
                tag: tag.to_string(),
                acquired_at: Instant::now(),
            },
        );
        #[cfg(feature = "metrics")]
        metrics::RESERVATIONS_ACTIVE.inc();
        ReservedSignedState::new(state.clone(), id, tag.to_string(), self.release_tx.clone())
    }

    /// Called by [`crate::GarbageCollector`] when a release ticket is
    /// drained. Decrements the tree's reservation count and drops the
    /// leak-diagnostic bookkeeping for that reservation id.
    pub(crate) fn finalize_release(&self, ticket: ReleaseTicket) {
        if let Err(err) = ticket.state.tree().release() {
            tracing::error!(error = %err, round = ticket.round, "background reservation release failed");
        }
        self.reservations.write().remove(&ticket.reservation_id);
        #[cfg(feature = "metrics")]
        metrics::RESERVATIONS_ACTIVE.dec();
    }

    /// Scanned by [`crate::LeakSentinel`]; never mutates anything (spec.md
    /// §5 "the sentinel logs violations but does not force release").
    pub(crate) fn scan_leaks(&self, ttl: std::time::Duration) -> Vec<(u64, String, std::time::Duration)> {
        let now = Instant::now();
        self.reservations
            .read()
            .values()
            .filter_map(|record| {
                let held = now.duration_since(record.acquired_at);
                (held > ttl).then(|| (record.round, record.tag.clone(), held))
            })
            .collect()
    }
}

/// Tracks signed states round by round: accepts a new round's Merkle root,
/// collects weighted signatures toward a completion threshold, and evicts
/// rounds that fall outside the retention window (spec.md §4.10).
#[derive(Clone)]
pub struct SignedStateManager {
    inner: Arc<Inner>,
}

impl SignedStateManager {
    pub fn new(
        config: StateManagerConfig,
        hasher: Arc<dyn Hasher>,
        consumer: Arc<dyn CompleteStateConsumer>,
        sink: Arc<dyn StateSink>,
    ) -> (Self, mpsc::Receiver<ReleaseTicket>) {
        let (release_tx, release_rx) = mpsc::channel(config.release_queue_capacity);
        let inner = Arc::new(Inner {
            states: RwLock::new(BTreeMap::new()),
            table_reservation_ids: RwLock::new(HashMap::new()),
            current_latest_round: RwLock::new(None),
            latest_immutable_round: AtomicU64::new(0),
            latest_complete: RwLock::new(None),
            reservations: RwLock::new(HashMap::new()),
            next_reservation_id: AtomicU64::new(0),
            release_tx,
            hasher,
            config,
            consumer,
            sink,
        });
        (Self { inner }, release_rx)
    }

    /// Spawns the background collector draining this manager's release
    /// queue (spec.md §4.10 "Garbage Collector"). Pass the receiver
    /// returned alongside this manager from [`SignedStateManager::new`].
    pub fn spawn_collector(&self, release_rx: mpsc::Receiver<ReleaseTicket>) -> GarbageCollector {
        GarbageCollector::spawn(self.inner.clone(), release_rx)
    }

    /// Spawns the periodic leak sentinel (spec.md §4.10, §6
    /// `state.sentinel_leak_ttl`).
    pub fn spawn_sentinel(&self, ttl: std::time::Duration, sweep_interval: std::time::Duration) -> LeakSentinel {
        LeakSentinel::spawn(self.inner.clone(), ttl, sweep_interval)
    }

    pub fn latest_immutable_round(&self) -> u64 {
        self.inner.latest_immutable_round.load(Ordering::Acquire)
    }

    pub fn latest_complete(&self) -> Option<Arc<SignedState>> {
        self.inner.latest_complete.read().clone()
    }

    pub fn get(&self, round: u64) -> Option<Arc<SignedState>> {
        self.inner.states.read().get(&round).cloned()
    }

    /// Step 1-2 of the per-round pipeline (spec.md §4.10): stamps `tree`
    /// with `round`, hashes it, and inserts it into the signed-state table.
    /// Rejects a round that is already below the immutable floor with
    /// [`StateManagerError::OutOfOrderState`] (spec.md §8 property 9).
    #[tracing::instrument(level = "debug", skip(self, tree, roster))]
    pub fn submit_round(
        &self,
        round: u64,
        tree: MerkleTree,
        roster: Roster,
    ) -> Result<Arc<SignedState>, StateManagerError> {
        let floor = self.inner.latest_immutable_round.load(Ordering::Acquire);
        if round < floor {
            return Err(StateManagerError::OutOfOrderState {
                round,
                latest_immutable: floor,
            });
        }

        let hash = tree.hash(&*self.inner.hasher);
        let state = Arc::new(SignedState::new(round, tree, roster, hash));

        let reserved = self.inner.reserve_internal(&state, TABLE_RESERVATION_TAG);
        self.inner
            .table_reservation_ids
            .write()
            .insert(round, reserved.reservation_id());
        // The table's own reservation outlives this call — `evict_below_
        // retention` releases it explicitly through the same queue, so the
        // guard is deliberately forgotten here rather than dropped.
        std::mem::forget(reserved);

        self.inner.states.write().insert(round, state.clone());

        {
            let mut current = self.inner.current_latest_round.write();
            match *current {
                Some(previous) if round > previous => {
                    self.inner
                        .latest_immutable_round
                        .store(previous, Ordering::Release);
                    *current = Some(round);
                }
                None => *current = Some(round),
                _ => {}
            }
        }

        self.evict_below_retention();
        Ok(state)
    }

    /// Step 3 of the per-round pipeline: verifies `signature` against
    /// `node_id`'s registered key in that round's roster and records it.
    /// Crossing the configured weighted threshold marks the round
    /// *complete*, notifies the completion consumer, and triggers
    /// `should_save` (spec.md §4.10 points 3-4).
    #[tracing::instrument(level = "debug", skip(self, signature))]
    pub fn add_signature(
        &self,
        round: u64,
        node_id: NodeId,
        signature: Ed25519Signature,
    ) -> Result<(), StateManagerError> {
        let state = self
            .inner
            .states
            .read()
            .get(&round)
            .cloned()
            .ok_or(StateManagerError::UnknownRound { round })?;

        let entry = state
            .roster()
            .get(node_id)
            .ok_or(StateManagerError::UnknownSigner {
                round,
                node_id: node_id.as_u64(),
            })?;
        let public_key = Ed25519PublicKey::from_bytes(entry.public_key).map_err(|e| {
            StateManagerError::Fatal(format!("round {round} signer {node_id}: {e}"))
        })?;
        public_key
            .verify(state.hash().as_ref(), &signature)
            .map_err(|e| StateManagerError::Fatal(format!("round {round} signer {node_id}: {e}")))?;

        state.record_signature(node_id, signature);

        let cfg = &self.inner.config;
        if state.try_mark_complete(cfg.signature_threshold_numerator, cfg.signature_threshold_denominator)
        {
            self.promote_latest_complete(&state);
            self.inner.consumer.on_complete(state.clone());
            self.inner.sink.should_save(&state);
        }

        Ok(())
    }

    /// Compare-and-swap-style promotion of the "latest complete" pointer:
    /// only replaces it if `state`'s round is strictly newer (spec.md §5
    /// "the latest-complete pointer is updated with a compare-and-swap").
    fn promote_latest_complete(&self, state: &Arc<SignedState>) {
        let mut latest = self.inner.latest_complete.write();
        let should_replace = match latest.as_ref() {
            Some(current) => state.round() > current.round(),
            None => true,
        };
        if should_replace {
            *latest = Some(state.clone());
            #[cfg(feature = "metrics")]
            metrics::LATEST_COMPLETE_ROUND.set(state.round() as i64);
        }
    }

    /// Takes a named reservation on `round`'s tree (spec.md §4.10
    /// "Reservation discipline": "every component holding a state obtains a
    /// named reservation").
    pub fn reserve(
        &self,
        round: u64,
        tag: impl Into<String>,
    ) -> Result<ReservedSignedState, StateManagerError> {
        let state = self
            .inner
            .states
            .read()
            .get(&round)
            .cloned()
            .ok_or(StateManagerError::UnknownRound { round })?;
        Ok(self.inner.reserve_internal(&state, &tag.into()))
    }

    /// Step 5 of the per-round pipeline: evicts rounds below the sliding
    /// retention window, releasing each one's table reservation through
    /// the same background queue ordinary reservations use (spec.md §4.10
    /// point 5).
    fn evict_below_retention(&self) {
        let floor = self
            .inner
            .latest_immutable_round
            .load(Ordering::Acquire)
            .saturating_sub(self.inner.config.retention_window);

        let evicted: Vec<(u64, Arc<SignedState>)> = {
            let mut states = self.inner.states.write();
            let stale: Vec<u64> = states.range(..=floor).map(|(round, _)| *round).collect();
            stale
                .into_iter()
                .filter_map(|round| states.remove(&round).map(|state| (round, state)))
                .collect()
        };

        let mut table_ids = self.inner.table_reservation_ids.write();
        for (round, state) in evicted {
            if let Some(reservation_id) = table_ids.remove(&round) {
                let ticket = ReleaseTicket {
                    round,
                    state,
                    reservation_id,
                };
                if self.inner.release_tx.try_send(ticket).is_err() {
                    tracing::warn!(round, "eviction release queue full, dropping ticket on the floor");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{NoopConsumer, NoopSink};
    use qc_merkle::MerkleNode;
    use shared_crypto::{Ed25519KeyPair, Sha384Hasher};
    use shared_types::RosterEntry;

    fn roster_of(keypairs: &[&Ed25519KeyPair]) -> Roster {
        let entries = keypairs
            .iter()
            .enumerate()
            .map(|(i, kp)| RosterEntry {
                node_id: NodeId::new(i as u64),
                weight: 1,
                signing_cert: vec![i as u8],
                public_key: *kp.public_key().as_bytes(),
                gossip_endpoint: format!("127.0.0.1:{}", 30000 + i),
            })
            .collect();
        Roster::new(0, entries)
    }

    fn tree(tag: u8) -> MerkleTree {
        MerkleTree::new(MerkleNode::leaf(0, b"k".to_vec(), vec![tag]))
    }

    fn new_manager() -> (SignedStateManager, mpsc::Receiver<ReleaseTicket>) {
        SignedStateManager::new(
            StateManagerConfig::default(),
            Arc::new(Sha384Hasher),
            Arc::new(NoopConsumer),
            Arc::new(NoopSink),
        )
    }

    #[test]
    fn out_of_order_round_is_rejected_after_a_successor_arrives() {
        let (manager, _rx) = new_manager();
        let roster = roster_of(&[]);
        manager.submit_round(10, tree(1), roster.clone()).unwrap();
        manager.submit_round(11, tree(2), roster.clone()).unwrap();
        // 10 is now immutable (superseded by 11); resubmitting an even
        // older round must be rejected.
        let err = manager.submit_round(9, tree(3), roster).unwrap_err();
        assert!(matches!(
            err,
            StateManagerError::OutOfOrderState { round: 9, latest_immutable: 10 }
        ));
    }

    #[test]
    fn gap_fill_below_current_latest_is_accepted_before_it_is_superseded() {
        let (manager, _rx) = new_manager();
        let roster = roster_of(&[]);
        manager.submit_round(12, tree(1), roster.clone()).unwrap();
        // 12 was the first round ever submitted, so nothing is immutable
        // yet; an out-of-order-but-not-yet-superseded fill is accepted.
        assert!(manager.submit_round(11, tree(2), roster).is_ok());
    }

    #[test]
    fn signature_threshold_promotes_latest_complete_and_notifies() {
        let (manager, _rx) = new_manager();
        let a = Ed25519KeyPair::generate();
        let b = Ed25519KeyPair::generate();
        let c = Ed25519KeyPair::generate();
        let roster = roster_of(&[&a, &b, &c]);
        let state = manager.submit_round(1, tree(1), roster).unwrap();
        let sig = a.sign(state.hash().as_ref());

        manager.add_signature(1, NodeId::new(0), sig).unwrap();
        assert!(manager.get(1).unwrap().is_complete());
        assert_eq!(manager.latest_complete().unwrap().round(), 1);
    }

    #[test]
    fn invalid_signature_is_fatal() {
        let (manager, _rx) = new_manager();
        let a = Ed25519KeyPair::generate();
        let wrong = Ed25519KeyPair::generate();
        let roster = roster_of(&[&a]);
        let state = manager.submit_round(1, tree(1), roster).unwrap();
        let bad_sig = wrong.sign(state.hash().as_ref());

        let err = manager.add_signature(1, NodeId::new(0), bad_sig).unwrap_err();
        assert!(matches!(err, StateManagerError::Fatal(_)));
    }

    #[test]
    fn unknown_round_is_rejected() {
        let (manager, _rx) = new_manager();
        let a = Ed25519KeyPair::generate();
        let err = manager
            .add_signature(42, NodeId::new(0), a.sign(b"x"))
            .unwrap_err();
        assert!(matches!(err, StateManagerError::UnknownRound { round: 42 }));
    }

    #[test]
    fn retention_window_evicts_old_rounds() {
        let mut config = StateManagerConfig::default();
        config.retention_window = 1;
        let (manager, _rx) = SignedStateManager::new(
            config,
            Arc::new(Sha384Hasher),
            Arc::new(NoopConsumer),
            Arc::new(NoopSink),
        );
        let roster = roster_of(&[]);
        manager.submit_round(1, tree(1), roster.clone()).unwrap();
        manager.submit_round(2, tree(2), roster.clone()).unwrap();
        // Submitting round 3 makes round 2 immutable; floor = 2 - 1 = 1,
        // so round 1 (strictly below the floor) is evicted.
        manager.submit_round(3, tree(3), roster).unwrap();
        assert!(manager.get(1).is_none());
        assert!(manager.get(2).is_some());
    }
}
