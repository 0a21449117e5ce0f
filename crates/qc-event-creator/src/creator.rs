//! Creation-tick logic (spec.md §4.4).

use rand::Rng;
use shared_crypto::{Ed25519KeyPair, Hasher};
use shared_types::{NodeId, TimeSource};

use qc_event_core::{build_event, Event};
use qc_shadow_graph::{InsertOutcome, ShadowGraph};
use qc_tipset::TipsetTracker;

use crate::config::EventCreatorConfig;
use crate::error::CreatorError;
use crate::outcome::CreationOutcome;

/// Per-creator state for the event-creation tick. One instance per node
/// process; `creator` is this node's own identity.
pub struct EventCreator {
    creator: NodeId,
    config: EventCreatorConfig,
    last_self_event: Option<Event>,
    last_tick_at: Option<std::time::Instant>,
}

impl EventCreator {
    pub fn new(creator: NodeId, config: EventCreatorConfig) -> Self {
        Self {
            creator,
            config,
            last_self_event: None,
            last_tick_at: None,
        }
    }

    pub fn last_self_event(&self) -> Option<&Event> {
        self.last_self_event.as_ref()
    }

    /// Runs one scheduled creation tick: picks an other-parent, builds an
    /// event if warranted, and atomically registers it into `shadow_graph`
    /// and `tipset_tracker`.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        shadow_graph: &ShadowGraph,
        tipset_tracker: &TipsetTracker,
        keypair: &Ed25519KeyPair,
        transactions: Vec<Vec<u8>>,
        birth_round: u64,
        time_source: &dyn TimeSource,
        hasher: &dyn Hasher,
        rng: &mut impl Rng,
    ) -> Result<CreationOutcome, CreatorError> {
        if let Some(last_tick_at) = self.last_tick_at {
            if last_tick_at.elapsed() < self.config.min_tick_interval {
                return Ok(CreationOutcome::Throttled);
            }
        }

        let other_parents = match &self.last_self_event {
            None => Vec::new(),
            Some(self_event) => {
                match self.pick_other_parent(shadow_graph, tipset_tracker, self_event, rng) {
                    None => return Ok(CreationOutcome::NoEvent),
                    Some((descriptor, best_advancing)) => {
                        if best_advancing == 0 && self.caught_up_with_network(shadow_graph) {
                            return Ok(CreationOutcome::NoEvent);
                        }
                        vec![descriptor]
                    }
                }
            }
        };

        let timestamp = self
            .last_self_event
            .as_ref()
            .map(|e| e.min_child_timestamp())
            .unwrap_or_else(|| time_source.now())
            .max(time_source.now());

        let event = build_event(
            self.creator,
            self.last_self_event.as_ref(),
            other_parents,
            transactions,
            birth_round,
            timestamp,
            &self.config.limits,
            hasher,
        )?;

        let mut signed = event;
        qc_event_core::sign(&mut signed, keypair);

        let parent_descriptors: Vec<_> = signed
            .self_parent
            .into_iter()
            .chain(signed.other_parents.iter().copied())
            .collect();
        let descriptor = signed.descriptor();

        match shadow_graph.insert(signed.clone(), birth_round) {
            InsertOutcome::Ok => {
                tipset_tracker.record(&descriptor, &parent_descriptors, birth_round);
                self.last_self_event = Some(signed.clone());
                self.last_tick_at = Some(std::time::Instant::now());
                Ok(CreationOutcome::Created(signed))
            }
            outcome => Err(CreatorError::RegistrationRejected { outcome }),
        }
    }

    /// Picks the other-parent maximizing advancing weight relative to this
    /// creator's latest self-event tipset, with a `zero_weight_bias` chance
    /// of instead picking a zero-weight candidate to keep it integrated
    /// (spec.md §4.2 "Key design point", §8 property 4). Returns the chosen
    /// descriptor alongside the best advancing weight found across every
    /// candidate, so the caller can decide whether the tick produced any
    /// new information regardless of which candidate the bias roll picked.
    fn pick_other_parent(
        &self,
        shadow_graph: &ShadowGraph,
        tipset_tracker: &TipsetTracker,
        self_event: &Event,
        rng: &mut impl Rng,
    ) -> Option<(qc_event_core::EventDescriptor, u64)> {
        let roster = tipset_tracker.roster();
        let self_tipset = tipset_tracker.get(&self_event.hash)?;

        let mut scored: Vec<(Event, u64)> = shadow_graph
            .tips()
            .into_values()
            .filter(|candidate| candidate.creator != self.creator)
            .filter_map(|candidate| {
                let candidate_tipset = tipset_tracker.get(&candidate.hash)?;
                let (_, advancing) =
                    tipset_tracker.advancement_score(&candidate_tipset, &self_tipset);
                Some((candidate, advancing))
            })
            .collect();

        if scored.is_empty() {
            return None;
        }

        let best_advancing = scored.iter().map(|(_, score)| *score).max().unwrap_or(0);

        if rng.gen_bool(self.config.zero_weight_bias) {
            let zero_weight: Vec<_> = scored
                .iter()
                .filter(|(candidate, _)| roster.weight_of(candidate.creator) == 0)
                .collect();
            if let Some((candidate, _)) = zero_weight.get(rng.gen_range(0..zero_weight.len().max(1))) {
                return Some((candidate.descriptor(), best_advancing));
            }
        }

        scored.retain(|(_, score)| *score == best_advancing);
        let index = rng.gen_range(0..scored.len());
        Some((scored[index].0.descriptor(), best_advancing))
    }

    /// Whether this creator's own last event is already at least as recent
    /// as every other creator's latest known tip, meaning there is no
    /// unintegrated received event left to build on top of.
    fn caught_up_with_network(&self, shadow_graph: &ShadowGraph) -> bool {
        let Some(self_event) = &self.last_self_event else {
            return false;
        };
        shadow_graph
            .tips()
            .into_values()
            .filter(|candidate| candidate.creator != self.creator)
            .all(|candidate| candidate.timestamp <= self_event.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use qc_event_core::EventLimits;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared_crypto::Sha384Hasher;
    use shared_types::{Roster, RosterEntry, Timestamp};

    struct FixedTimeSource {
        nanos: AtomicU64,
    }

    impl FixedTimeSource {
        fn new(nanos: u64) -> Self {
            Self {
                nanos: AtomicU64::new(nanos),
            }
        }

        fn set(&self, nanos: u64) {
            self.nanos.store(nanos, Ordering::Relaxed);
        }
    }

    impl TimeSource for FixedTimeSource {
        fn now(&self) -> Timestamp {
            Timestamp::from_nanos(self.nanos.load(Ordering::Relaxed) as u128)
        }
    }

    fn roster(weights: &[(u64, u64)]) -> Arc<Roster> {
        let entries = weights
            .iter()
            .map(|(id, weight)| RosterEntry {
                node_id: NodeId::new(*id),
                weight: *weight,
                signing_cert: vec![],
                public_key: [0u8; 32],
                gossip_endpoint: format!("127.0.0.1:{}", 30000 + id),
            })
            .collect();
        Arc::new(Roster::new(0, entries))
    }

    fn insert_genesis(
        shadow_graph: &ShadowGraph,
        tipset_tracker: &TipsetTracker,
        creator: u64,
        timestamp_nanos: u128,
    ) -> Event {
        let keypair = Ed25519KeyPair::generate();
        let mut event = build_event(
            NodeId::new(creator),
            None,
            vec![],
            vec![],
            1,
            Timestamp::from_nanos(timestamp_nanos),
            &EventLimits::default(),
            &Sha384Hasher,
        )
        .unwrap();
        qc_event_core::sign(&mut event, &keypair);
        shadow_graph.insert(event.clone(), 1);
        tipset_tracker.record(&event.descriptor(), &[], 1);
        event
    }

    /// Builds the next self-child of `peer`'s current tip and registers it,
    /// simulating that peer's own creator advancing on the network.
    fn advance_peer(
        shadow_graph: &ShadowGraph,
        tipset_tracker: &TipsetTracker,
        peer_tips: &mut HashMap<u64, Event>,
        peer: u64,
    ) {
        let parent = peer_tips.get(&peer).expect("peer must already have a genesis tip");
        let keypair = Ed25519KeyPair::generate();
        let mut child = build_event(
            NodeId::new(peer),
            Some(parent),
            vec![],
            vec![],
            1,
            parent.min_child_timestamp(),
            &EventLimits::default(),
            &Sha384Hasher,
        )
        .unwrap();
        qc_event_core::sign(&mut child, &keypair);
        shadow_graph.insert(child.clone(), 1);
        tipset_tracker.record(&child.descriptor(), &[parent.descriptor()], 1);
        peer_tips.insert(peer, child);
    }

    #[test]
    fn self_parent_timestamp_floor_holds_even_if_the_clock_goes_backward() {
        let roster = roster(&[(0, 1), (1, 1)]);
        let shadow_graph = ShadowGraph::new();
        let tipset_tracker = TipsetTracker::new(roster);
        insert_genesis(&shadow_graph, &tipset_tracker, 1, 1_000_000_000);

        let keypair = Ed25519KeyPair::generate();
        let config = EventCreatorConfig {
            min_tick_interval: Duration::ZERO,
            zero_weight_bias: 0.0,
            limits: EventLimits::default(),
        };
        let mut creator = EventCreator::new(NodeId::new(0), config);
        let time_source = FixedTimeSource::new(500);
        let mut rng = StdRng::seed_from_u64(1);

        let genesis = creator
            .tick(
                &shadow_graph,
                &tipset_tracker,
                &keypair,
                vec![],
                1,
                &time_source,
                &Sha384Hasher,
                &mut rng,
            )
            .unwrap()
            .into_event()
            .expect("first tick always creates a genesis event");
        let floor = genesis.min_child_timestamp();

        // The clock runs backward relative to the floor the self-parent demands.
        time_source.set((floor.as_nanos() - 1) as u64);
        let second = creator
            .tick(
                &shadow_graph,
                &tipset_tracker,
                &keypair,
                vec![],
                1,
                &time_source,
                &Sha384Hasher,
                &mut rng,
            )
            .unwrap()
            .into_event()
            .expect("node 1's tip gives node 0 a nonzero advancing candidate, so this creates");

        assert_eq!(second.timestamp, floor);
    }

    #[test]
    fn zero_weight_node_is_still_occasionally_picked_as_other_parent() {
        let weights: Vec<(u64, u64)> = (0u64..10)
            .map(|id| (id, if id == 0 { 0 } else { 1 }))
            .collect();
        let roster = roster(&weights);
        let shadow_graph = ShadowGraph::new();
        let tipset_tracker = TipsetTracker::new(roster);

        let mut peer_tips = HashMap::new();
        for (i, peer) in [0u64, 2, 3, 4, 5, 6, 7, 8, 9].into_iter().enumerate() {
            let event = insert_genesis(&shadow_graph, &tipset_tracker, peer, 1_000 + i as u128);
            peer_tips.insert(peer, event);
        }

        let keypair = Ed25519KeyPair::generate();
        let config = EventCreatorConfig {
            min_tick_interval: Duration::ZERO,
            ..EventCreatorConfig::default()
        };
        let mut creator = EventCreator::new(NodeId::new(1), config);
        let time_source = FixedTimeSource::new(1_000_000);
        let mut rng = StdRng::seed_from_u64(42);

        creator
            .tick(
                &shadow_graph,
                &tipset_tracker,
                &keypair,
                vec![],
                1,
                &time_source,
                &Sha384Hasher,
                &mut rng,
            )
            .unwrap()
            .into_event()
            .expect("first tick creates node 1's own genesis");

        let advancing_peers = [2u64, 3, 4, 5, 6, 7, 8, 9];
        let mut zero_weight_picks = 0usize;
        let mut next_nanos = 2_000_000u64;
        for round in 0..1000usize {
            let peer = advancing_peers[round % advancing_peers.len()];
            advance_peer(&shadow_graph, &tipset_tracker, &mut peer_tips, peer);

            time_source.set(next_nanos);
            next_nanos += 1_000;

            let outcome = creator
                .tick(
                    &shadow_graph,
                    &tipset_tracker,
                    &keypair,
                    vec![],
                    1,
                    &time_source,
                    &Sha384Hasher,
                    &mut rng,
                )
                .unwrap();
            if let Some(event) = outcome.into_event() {
                if event.other_parents.iter().any(|d| d.creator == NodeId::new(0)) {
                    zero_weight_picks += 1;
                }
            }
        }

        assert!(
            zero_weight_picks >= 20,
            "node 0 (weight 0) should still be chosen as other-parent at least 20 times \
             across 1000 rounds via zero_weight_bias, got {zero_weight_picks}"
        );
    }
}
