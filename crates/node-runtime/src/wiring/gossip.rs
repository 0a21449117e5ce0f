//! Dials every other roster member and accepts inbound connections,
//! running one [`qc_gossip::GossipSession`] per connection to completion
//! (spec.md §4.5). Re-dial uses [`qc_gossip::RedialBackoff`], one instance
//! per peer so a single unreachable peer never throttles dialing the rest
//! (spec.md §4.5 "peer is scheduled for re-dial with exponential backoff").
//!
//! Transport is plain TCP by default; the `mtls` feature swaps in
//! `crate::transport::mtls` instead (see DESIGN.md).

use std::sync::Arc;

use qc_gossip::{GossipSession, RedialBackoff};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::context::PlatformContext;
use crate::error::NodeError;
use crate::wiring::subsystems::Subsystems;

const SOFTWARE_VERSION: u32 = 1;

pub fn spawn_accept_loop(ctx: PlatformContext, subsystems: Arc<Subsystems>) -> JoinHandle<Result<(), NodeError>> {
    tokio::spawn(async move {
        let listener = TcpListener::bind(ctx.config.listen_addr)
            .await
            .map_err(|source| NodeError::Bind {
                addr: ctx.config.listen_addr,
                source,
            })?;
        tracing::info!(addr = %ctx.config.listen_addr, "gossip listener bound");

        loop {
            tokio::select! {
                _ = ctx.cancellation.cancelled() => return Ok(()),
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    spawn_session(ctx.clone(), subsystems.clone(), stream, peer_addr.to_string());
                }
            }
        }
    })
}

pub fn spawn_dial_loops(ctx: PlatformContext, subsystems: Arc<Subsystems>) -> Vec<JoinHandle<()>> {
    let roster = ctx.roster();
    roster
        .iter()
        .filter(|entry| entry.node_id != ctx.own_node_id)
        .map(|entry| {
            let endpoint = entry.gossip_endpoint.clone();
            let ctx = ctx.clone();
            let subsystems = subsystems.clone();
            tokio::spawn(async move { dial_loop(ctx, subsystems, endpoint).await })
        })
        .collect()
}

async fn dial_loop(ctx: PlatformContext, subsystems: Arc<Subsystems>, endpoint: String) {
    let gossip_config = ctx.config.gossip_config();
    let mut backoff = RedialBackoff::new(gossip_config.redial_initial_backoff, gossip_config.redial_max_backoff);

    loop {
        tokio::select! {
            _ = ctx.cancellation.cancelled() => return,
            stream = TcpStream::connect(&endpoint) => {
                match stream {
                    Ok(stream) => {
                        backoff.success();
                        run_session(ctx.clone(), subsystems.clone(), stream, endpoint.clone()).await;
                    }
                    Err(err) => {
                        let delay = backoff.failure();
                        tracing::debug!(endpoint = %endpoint, error = %err, delay_ms = delay.as_millis() as u64, "dial failed, backing off");
                        tokio::select! {
                            _ = ctx.cancellation.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }
}

fn spawn_session(ctx: PlatformContext, subsystems: Arc<Subsystems>, stream: TcpStream, label: String) {
    tokio::spawn(async move { run_session(ctx, subsystems, stream, label).await });
}

async fn run_session(ctx: PlatformContext, subsystems: Arc<Subsystems>, stream: TcpStream, label: String) {
    let session = GossipSession::new(
        stream,
        subsystems.shadow_graph.clone(),
        ctx.roster(),
        ctx.hasher.clone(),
        ctx.own_node_id,
        SOFTWARE_VERSION,
        ctx.config.gossip_config(),
        ctx.cancellation.clone(),
    )
    .with_tipset_tracker(subsystems.tipset_tracker.clone());

    let outcome = session.run().await;
    tracing::debug!(peer = %label, outcome = ?outcome, "gossip session ended");
}
