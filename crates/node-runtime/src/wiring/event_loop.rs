//! Periodic event-creation tick (spec.md §4.4). Transaction sourcing and
//! consensus-round advancement are out of scope (spec.md §1 Non-goals: "no
//! service-level transaction handlers"); this loop creates empty-payload
//! events once per tick and advances its own local birth-round counter by
//! one on every event actually created, giving the rest of the wiring a
//! monotonically increasing round number to hang the shadow graph's ancient
//! threshold and the state manager's rounds off of.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use qc_event_creator::CreationOutcome;
use tokio::task::JoinHandle;

use crate::context::PlatformContext;
use crate::wiring::subsystems::Subsystems;

/// Shared with the pruning loop so both agree on "the current round".
pub struct RoundCounter(AtomicU64);

impl RoundCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(0)))
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

pub fn spawn(ctx: PlatformContext, subsystems: Arc<Subsystems>, round: Arc<RoundCounter>) -> JoinHandle<()> {
    let interval = std::time::Duration::from_millis(ctx.config.tipset.min_tick_interval_ms.max(25));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut rng = rand::thread_rng();
        loop {
            tokio::select! {
                _ = ctx.cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let birth_round = round.current();
            let outcome = {
                let mut creator = subsystems.event_creator.lock();
                creator.tick(
                    &subsystems.shadow_graph,
                    &subsystems.tipset_tracker,
                    &ctx.keypair,
                    Vec::new(),
                    birth_round,
                    ctx.time_source.as_ref(),
                    ctx.hasher.as_ref(),
                    &mut rng,
                )
            };

            match outcome {
                Ok(CreationOutcome::Created(event)) => {
                    round.advance();
                    tracing::debug!(hash = %event.hash, birth_round, "created event");
                }
                Ok(CreationOutcome::Throttled) | Ok(CreationOutcome::NoEvent) => {}
                Err(err) => tracing::warn!(error = %err, "event creation tick failed"),
            }
        }
    })
}
