//! Gossip session state machine, spec.md §4.5: `HANDSHAKE -> TIP_EXCHANGE ->
//! DIFF -> TRANSFER -> COMMIT`, or `ABORT` from any state.
//!
//! One [`GossipSession`] drives exactly one peer connection to completion
//! (commit or abort) and then drops. The caller (the gossip scheduler in
//! `node-runtime`) is responsible for dialing, re-dialing with
//! [`crate::backoff::RedialBackoff`], and running sessions concurrently
//! across peers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use qc_event_core::{EventDescriptor, VerifyOutcome};
use qc_shadow_graph::{InsertOutcome, ShadowGraph};
use qc_tipset::TipsetTracker;
use shared_crypto::{Ed25519Signature, Hasher};
use shared_types::{Hash, NodeId, Roster};
use shared_bus::CancellationToken;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::GossipConfig;
use crate::error::{AbortReason, GossipError, TransportFailureKind};
use crate::frame::{Frame, GOSSIP_VIEW_ID};
use crate::payload::{Payload, TipAdvert};
use crate::transport::FrameTransport;

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    Committed {
        events_sent: usize,
        events_received: usize,
    },
    Aborted(AbortReason),
}

/// Drives one peer connection through the gossip protocol.
pub struct GossipSession<S> {
    transport: FrameTransport<S>,
    shadow_graph: ShadowGraph,
    tipset_tracker: Option<Arc<TipsetTracker>>,
    roster: Arc<Roster>,
    hasher: Arc<dyn Hasher>,
    own_node_id: NodeId,
    software_version: u32,
    config: GossipConfig,
    cancellation: CancellationToken,
}

impl<S> GossipSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: S,
        shadow_graph: ShadowGraph,
        roster: Arc<Roster>,
        hasher: Arc<dyn Hasher>,
        own_node_id: NodeId,
        software_version: u32,
        config: GossipConfig,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            transport: FrameTransport::new(stream),
            shadow_graph,
            tipset_tracker: None,
            roster,
            hasher,
            own_node_id,
            software_version,
            config,
            cancellation,
        }
    }

    /// Also records inbound events into `tracker`, so a subsequent
    /// event-creation tick can pick them as other-parents (spec.md §4.2).
    /// Without this, received events would only ever be visible to future
    /// other-parent selection through a later, separate registration pass.
    pub fn with_tipset_tracker(mut self, tracker: Arc<TipsetTracker>) -> Self {
        self.tipset_tracker = Some(tracker);
        self
    }

    /// Runs the session to completion, never panicking regardless of how it
    /// ends. The overall deadline (spec.md §4.5) bounds the whole exchange,
    /// not just one frame read.
    pub async fn run(mut self) -> SessionOutcome {
        let deadline = self.config.session_deadline;
        match tokio::time::timeout(deadline, self.drive()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(GossipError::Aborted(reason))) => SessionOutcome::Aborted(reason),
            Ok(Err(GossipError::Transport(io_err))) => {
                let kind = if io_err.kind() == std::io::ErrorKind::UnexpectedEof {
                    TransportFailureKind::Closed
                } else {
                    TransportFailureKind::Io
                };
                SessionOutcome::Aborted(AbortReason::Transport(kind))
            }
            Ok(Err(GossipError::Decode(_))) | Ok(Err(GossipError::Wire(_))) => {
                SessionOutcome::Aborted(AbortReason::ProtocolViolation)
            }
            Err(_elapsed) => SessionOutcome::Aborted(AbortReason::Timeout),
        }
    }

    async fn drive(&mut self) -> Result<SessionOutcome, GossipError> {
        // HANDSHAKE
        self.send(Payload::Hello {
            roster_epoch: self.roster.epoch,
            software_version: self.software_version,
        })
        .await?;
        let hello = self.recv().await?;
        let their_epoch = match hello {
            Payload::Hello { roster_epoch, .. } => roster_epoch,
            Payload::Abort(reason) => return Ok(SessionOutcome::Aborted(reason)),
            _ => return self.abort(AbortReason::ProtocolViolation).await,
        };
        if their_epoch != self.roster.epoch {
            return self.abort(AbortReason::EpochMismatch {
                ours: self.roster.epoch,
                theirs: their_epoch,
            })
            .await;
        }

        // Hold the current ancient threshold steady for the life of the
        // session so events selected during DIFF cannot be evicted out from
        // under TRANSFER (spec.md §4.3 `reserve_window`).
        let _window = self.shadow_graph.reserve_window(self.shadow_graph.ancient_threshold());

        // TIP_EXCHANGE
        let local_tips = self.local_tip_adverts();
        self.send(Payload::Tips(local_tips)).await?;
        let peer_tips = match self.recv().await? {
            Payload::Tips(tips) => tips,
            Payload::Abort(reason) => return Ok(SessionOutcome::Aborted(reason)),
            _ => return self.abort(AbortReason::ProtocolViolation).await,
        };

        // DIFF
        let to_send = self.diff_missing_for_peer(&peer_tips);

        // TRANSFER
        let mut events_sent = 0usize;
        for event in &to_send {
            if self.cancellation.is_cancelled() {
                return self.abort(AbortReason::OperatorCancelled).await;
            }
            self.send(Payload::Event(event.to_wire())).await?;
            events_sent += 1;
        }
        self.send(Payload::Ack).await?;

        let mut events_received = 0usize;
        loop {
            if self.cancellation.is_cancelled() {
                return self.abort(AbortReason::OperatorCancelled).await;
            }
            match self.recv().await? {
                Payload::Event(wire_event) => {
                    events_received += 1;
                    if events_received > self.config.max_outstanding_events {
                        return self.abort(AbortReason::ProtocolViolation).await;
                    }
                    if let Err(reason) = self.accept_wire_event(wire_event) {
                        return self.abort(reason).await;
                    }
                }
                Payload::Ack => break,
                Payload::Abort(reason) => return Ok(SessionOutcome::Aborted(reason)),
                _ => return self.abort(AbortReason::ProtocolViolation).await,
            }
        }

        // COMMIT
        Ok(SessionOutcome::Committed {
            events_sent,
            events_received,
        })
    }

    async fn send(&mut self, payload: Payload) -> Result<(), GossipError> {
        self.transport
            .send_frame(&Frame::new(GOSSIP_VIEW_ID, payload.encode()))
            .await
    }

    async fn recv(&mut self) -> Result<Payload, GossipError> {
        let frame = self.transport.recv_frame().await?;
        Payload::decode(frame.payload)
    }

    async fn abort(&mut self, reason: AbortReason) -> Result<SessionOutcome, GossipError> {
        // Best-effort notification; the peer may already be gone.
        let _ = self.send(Payload::Abort(reason)).await;
        Ok(SessionOutcome::Aborted(reason))
    }

    fn local_tip_adverts(&self) -> Vec<TipAdvert> {
        self.shadow_graph
            .tips()
            .into_values()
            .map(|event| TipAdvert {
                creator: event.creator,
                hash: event.hash,
                generation: event.generation,
                birth_round: event.birth_round,
            })
            .collect()
    }

    /// Every locally-held ancestor of our tips the peer's advertised
    /// per-creator generations say it does not yet have, returned in
    /// topological (parent-before-child) order so [`ShadowGraph::insert`]
    /// on the receiving side never sees a child before its parent (spec.md
    /// §8 property 1).
    fn diff_missing_for_peer(
        &self,
        peer_tips: &[TipAdvert],
    ) -> Vec<qc_event_core::Event> {
        let peer_known: HashMap<NodeId, u64> =
            peer_tips.iter().map(|t| (t.creator, t.generation)).collect();

        let mut visited: HashSet<Hash> = HashSet::new();
        let mut ordered = Vec::new();
        for event in self.shadow_graph.tips().into_values() {
            self.collect_missing(&event, &peer_known, &mut visited, &mut ordered);
        }
        ordered
    }

    fn collect_missing(
        &self,
        event: &qc_event_core::Event,
        peer_known: &HashMap<NodeId, u64>,
        visited: &mut HashSet<Hash>,
        ordered: &mut Vec<qc_event_core::Event>,
    ) {
        if !visited.insert(event.hash) {
            return;
        }
        if let Some(&known_generation) = peer_known.get(&event.creator) {
            if event.generation <= known_generation {
                return;
            }
        }

        if let Some(parent) = event.self_parent {
            if let Some(parent_event) = self.shadow_graph.get(&parent.hash) {
                self.collect_missing(&parent_event, peer_known, visited, ordered);
            }
        }
        for parent in &event.other_parents {
            if let Some(parent_event) = self.shadow_graph.get(&parent.hash) {
                self.collect_missing(&parent_event, peer_known, visited, ordered);
            }
        }

        ordered.push(event.clone());
    }

    /// Validates an inbound wire event and, if it checks out, registers it
    /// into the shadow graph (and tipset tracker, if wired). Parent
    /// generations are resolved by lookup rather than trusted off the wire
    /// (spec.md §6: "generation is derived, not transmitted").
    fn accept_wire_event(
        &self,
        wire_event: qc_event_core::wire::WireEvent,
    ) -> Result<(), AbortReason> {
        let event = self.resolve_wire_event(wire_event)?;

        if qc_event_core::verify(&event, &self.roster) != VerifyOutcome::Ok {
            return Err(AbortReason::InvalidEvent);
        }
        if qc_event_core::recompute_hash(&event, self.hasher.as_ref()) != event.hash {
            return Err(AbortReason::InvalidEvent);
        }

        let parent_descriptors: Vec<EventDescriptor> = event
            .self_parent
            .into_iter()
            .chain(event.other_parents.iter().copied())
            .collect();
        let descriptor = event.descriptor();
        let indicator = event.birth_round;

        match self.shadow_graph.insert(event, indicator) {
            InsertOutcome::Ok => {
                if let Some(tracker) = &self.tipset_tracker {
                    tracker.record(&descriptor, &parent_descriptors, indicator);
                }
                Ok(())
            }
            // A concurrently-learned duplicate or an event that aged out
            // mid-session is not a protocol violation; just drop it.
            InsertOutcome::Duplicate | InsertOutcome::Ancient => Ok(()),
        }
    }

    fn resolve_wire_event(
        &self,
        wire: qc_event_core::wire::WireEvent,
    ) -> Result<qc_event_core::Event, AbortReason> {
        let self_parent = match &wire.self_parent {
            Some(p) => {
                let parent = self
                    .shadow_graph
                    .get(&p.hash)
                    .ok_or(AbortReason::ProtocolViolation)?;
                Some(EventDescriptor::new(p.hash, p.creator, p.birth_round, parent.generation))
            }
            None => None,
        };

        let mut other_parents = Vec::with_capacity(wire.other_parents.len());
        for p in &wire.other_parents {
            let parent = self
                .shadow_graph
                .get(&p.hash)
                .ok_or(AbortReason::ProtocolViolation)?;
            other_parents.push(EventDescriptor::new(p.hash, p.creator, p.birth_round, parent.generation));
        }

        let generation = [
            self_parent.map(|d| d.generation),
            other_parents.iter().map(|d| d.generation).max(),
        ]
        .into_iter()
        .flatten()
        .max()
        .map(|max_parent_generation| max_parent_generation + 1)
        .unwrap_or(0);

        let hash = wire.hash.ok_or(AbortReason::ProtocolViolation)?;
        let signature_bytes = wire.signature.ok_or(AbortReason::ProtocolViolation)?;
        let signature_array: [u8; 64] = signature_bytes
            .try_into()
            .map_err(|_| AbortReason::InvalidEvent)?;

        Ok(qc_event_core::Event {
            creator: wire.creator,
            self_parent,
            other_parents,
            timestamp: wire.timestamp,
            transactions: wire.transactions,
            birth_round: wire.birth_round,
            generation,
            hash,
            signature: Some(Ed25519Signature::from_bytes(signature_array)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_event_core::{build_event, sign, EventLimits};
    use shared_crypto::{Ed25519KeyPair, Sha384Hasher};
    use shared_types::{RosterEntry, Timestamp};
    use tokio::io::duplex;

    fn roster_with(keypairs: &[(&Ed25519KeyPair, u64)]) -> Arc<Roster> {
        let entries = keypairs
            .iter()
            .map(|(kp, weight)| RosterEntry {
                node_id: NodeId::new(*weight),
                weight: *weight,
                signing_cert: vec![],
                public_key: *kp.public_key().as_bytes(),
                gossip_endpoint: "127.0.0.1:0".into(),
            })
            .collect();
        Arc::new(Roster::new(0, entries))
    }

    fn genesis(creator: NodeId, keypair: &Ed25519KeyPair, ts: u128) -> qc_event_core::Event {
        let mut event = build_event(
            creator,
            None,
            vec![],
            vec![b"tx".to_vec()],
            1,
            Timestamp::from_nanos(ts),
            &EventLimits::default(),
            &Sha384Hasher,
        )
        .unwrap();
        sign(&mut event, keypair);
        event
    }

    fn session_pair() -> (
        GossipSession<tokio::io::DuplexStream>,
        GossipSession<tokio::io::DuplexStream>,
        ShadowGraph,
        ShadowGraph,
    ) {
        let (a, b) = duplex(1 << 20);
        let keypair = Ed25519KeyPair::generate();
        let roster = roster_with(&[(&keypair, 0)]);

        let graph_a = ShadowGraph::new();
        let graph_b = ShadowGraph::new();

        let session_a = GossipSession::new(
            a,
            graph_a.clone(),
            roster.clone(),
            Arc::new(Sha384Hasher),
            NodeId::new(0),
            1,
            GossipConfig::default(),
            CancellationToken::new(),
        );
        let session_b = GossipSession::new(
            b,
            graph_b.clone(),
            roster,
            Arc::new(Sha384Hasher),
            NodeId::new(0),
            1,
            GossipConfig::default(),
            CancellationToken::new(),
        );
        (session_a, session_b, graph_a, graph_b)
    }

    #[tokio::test]
    async fn missing_events_transfer_from_the_side_that_has_them() {
        let keypair = Ed25519KeyPair::generate();
        let creator = NodeId::new(0);
        let event = genesis(creator, &keypair, 1_000);

        let (session_a, session_b, graph_a, graph_b) = session_pair();
        graph_a.insert(event.clone(), 1);

        let (outcome_a, outcome_b) = tokio::join!(session_a.run(), session_b.run());

        assert!(matches!(outcome_a, SessionOutcome::Committed { .. }));
        assert!(matches!(outcome_b, SessionOutcome::Committed { .. }));
        assert!(graph_b.contains(&event.hash), "peer must learn the missing event");
    }

    #[tokio::test]
    async fn epoch_mismatch_aborts_the_session() {
        let (a, b) = duplex(1 << 16);
        let kp_a = Ed25519KeyPair::generate();
        let kp_b = Ed25519KeyPair::generate();
        let roster_a = roster_with(&[(&kp_a, 0)]);
        let mut entries = roster_a.entries().to_vec();
        entries.push(RosterEntry {
            node_id: NodeId::new(1),
            weight: 1,
            signing_cert: vec![],
            public_key: *kp_b.public_key().as_bytes(),
            gossip_endpoint: "127.0.0.1:0".into(),
        });
        let roster_b = Arc::new(Roster::new(7, entries));

        let session_a = GossipSession::new(
            a,
            ShadowGraph::new(),
            roster_a,
            Arc::new(Sha384Hasher),
            NodeId::new(0),
            1,
            GossipConfig::default(),
            CancellationToken::new(),
        );
        let session_b = GossipSession::new(
            b,
            ShadowGraph::new(),
            roster_b,
            Arc::new(Sha384Hasher),
            NodeId::new(1),
            1,
            GossipConfig::default(),
            CancellationToken::new(),
        );

        let (outcome_a, outcome_b) = tokio::join!(session_a.run(), session_b.run());
        assert!(matches!(
            outcome_a,
            SessionOutcome::Aborted(AbortReason::EpochMismatch { .. })
        ));
        assert!(matches!(
            outcome_b,
            SessionOutcome::Aborted(AbortReason::EpochMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn operator_cancellation_aborts_cleanly() {
        let (session_a, session_b, _graph_a, _graph_b) = session_pair();
        session_a.cancellation.cancel();

        let (outcome_a, outcome_b) = tokio::join!(session_a.run(), session_b.run());
        assert!(matches!(
            outcome_a,
            SessionOutcome::Aborted(AbortReason::OperatorCancelled)
                | SessionOutcome::Aborted(AbortReason::Transport(_))
        ));
        // Whichever side notices first aborts; the other observes either the
        // forwarded abort reason or the resulting transport closure -
        // session abort is idempotent either way (spec.md §8 property 8).
        assert!(matches!(
            outcome_b,
            SessionOutcome::Aborted(_)
        ));
    }
}
