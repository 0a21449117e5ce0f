//! Periodically advances the shadow graph's ancient threshold and prunes
//! the tipset tracker to match (spec.md §4.3 `advance_ancient_threshold`,
//! §4.2 `prune`), keyed off the same round counter the event-creation loop
//! advances.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::context::PlatformContext;
use crate::wiring::event_loop::RoundCounter;
use crate::wiring::subsystems::Subsystems;

pub fn spawn(ctx: PlatformContext, subsystems: Arc<Subsystems>, round: Arc<RoundCounter>) -> JoinHandle<()> {
    let ancient_window = ctx.config.shadow_graph.ancient_window;
    let interval = std::time::Duration::from_millis(ctx.config.shadow_graph.prune_interval_ms);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ctx.cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let threshold = round.current().saturating_sub(ancient_window);
            subsystems.shadow_graph.advance_ancient_threshold(threshold);
            subsystems.tipset_tracker.prune(threshold);
        }
    })
}
