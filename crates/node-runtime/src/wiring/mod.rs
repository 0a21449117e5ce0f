//! Wiring: builds every subsystem and the background tasks that drive them,
//! mirroring `wiring::core_subsystems`/`wiring::event_routing`'s role of
//! gluing subsystem instances together outside of the subsystems
//! themselves.

pub mod event_loop;
pub mod gossip;
pub mod prune_loop;
pub mod reconnect;
pub mod subsystems;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::context::PlatformContext;
use crate::error::NodeError;
use event_loop::RoundCounter;
use subsystems::Subsystems;

/// A running node: every background task handle, kept so shutdown can wait
/// for them to unwind instead of dropping them on the floor.
pub struct RunningNode {
    pub subsystems: Arc<Subsystems>,
    tasks: Vec<JoinHandle<()>>,
    accept_task: JoinHandle<Result<(), NodeError>>,
}

impl RunningNode {
    pub fn build(ctx: PlatformContext) -> Result<Self, NodeError> {
        let subsystems = Arc::new(Subsystems::build(&ctx)?);
        let round = RoundCounter::new();

        let mut tasks = Vec::new();
        tasks.push(event_loop::spawn(ctx.clone(), subsystems.clone(), round.clone()));
        tasks.push(prune_loop::spawn(ctx.clone(), subsystems.clone(), round));
        tasks.extend(gossip::spawn_dial_loops(ctx.clone(), subsystems.clone()));
        let accept_task = gossip::spawn_accept_loop(ctx, subsystems.clone());

        Ok(Self {
            subsystems,
            tasks,
            accept_task,
        })
    }

    /// Waits for the gossip listener to exit — only happens on bind
    /// failure or cancellation — and returns its result as this node's
    /// overall outcome.
    pub async fn join(self) -> Result<(), NodeError> {
        let result = self.accept_task.await.map_err(|e| NodeError::Fatal(e.to_string()))?;
        for task in self.tasks {
            let _ = task.await;
        }
        result
    }
}
