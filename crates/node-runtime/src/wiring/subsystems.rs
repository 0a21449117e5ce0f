//! Assembles every domain crate into one `Subsystems` bundle, in dependency
//! order (event core types have no runtime state; shadow graph and tipset
//! tracker are independent; event creator and gossip sessions both depend on
//! them; the signed-state manager and its background tasks are last since
//! nothing else depends on them at construction time).
//!
//! Mirrors `container::subsystems::SubsystemContainer`'s role: one place
//! that owns every long-lived handle, built once in `main` and threaded
//! through the wiring loops.

use std::sync::Arc;

use parking_lot::Mutex;
use qc_event_creator::EventCreator;
use qc_peer_identity::{PeerIdentifier, TrustStore};
use qc_shadow_graph::ShadowGraph;
use qc_state_manager::{GarbageCollector, LeakSentinel, NoopConsumer, NoopSink, SignedStateManager};
use qc_tipset::TipsetTracker;

use crate::context::PlatformContext;
use crate::error::NodeError;

/// Every long-lived subsystem handle for this node process.
pub struct Subsystems {
    pub shadow_graph: ShadowGraph,
    pub tipset_tracker: Arc<TipsetTracker>,
    pub event_creator: Arc<Mutex<EventCreator>>,
    pub peer_identifier: Arc<PeerIdentifier>,
    pub state_manager: SignedStateManager,
    // Held for their lifetime management; both run until dropped or aborted.
    pub collector: GarbageCollector,
    pub sentinel: LeakSentinel,
}

impl Subsystems {
    pub fn build(ctx: &PlatformContext) -> Result<Self, NodeError> {
        let roster = ctx.roster();

        let shadow_graph = ShadowGraph::new();
        let tipset_tracker = Arc::new(TipsetTracker::new(roster.clone()));
        let event_creator = Arc::new(Mutex::new(EventCreator::new(
            ctx.own_node_id,
            ctx.config.event_creator_config(),
        )));
        let peer_identifier = Arc::new(PeerIdentifier::new(TrustStore::new(roster)));

        let (state_manager, release_rx) = SignedStateManager::new(
            ctx.config.state_manager_config(),
            ctx.hasher.clone(),
            Arc::new(NoopConsumer),
            Arc::new(NoopSink),
        );
        let collector = state_manager.spawn_collector(release_rx);
        let state_settings = &ctx.config.state;
        let sentinel = state_manager.spawn_sentinel(
            std::time::Duration::from_secs(state_settings.sentinel_leak_ttl_secs),
            std::time::Duration::from_secs(state_settings.sentinel_sweep_interval_secs),
        );

        Ok(Self {
            shadow_graph,
            tipset_tracker,
            event_creator,
            peer_identifier,
            state_manager,
            collector,
            sentinel,
        })
    }

    /// Publishes a new roster snapshot to every component that caches one
    /// (spec.md §4.6 "atomic trust-store refresh", §4.2 roster-indexed
    /// tipsets).
    pub fn rotate_roster(&self, roster: Arc<shared_types::Roster>) {
        self.tipset_tracker.set_roster(roster.clone());
        self.peer_identifier.trust_store().refresh(roster);
    }
}
