//! Observer hooks a host wires into [`crate::SignedStateManager`] (spec.md
//! §4.10 points 4-5: "notify the latest complete consumer", "trigger
//! `should_save(state)`"). Plain `dyn` trait objects, matching the
//! `DataSource`/`LearnerSnapshot`/`TimeSource` style used by the sibling
//! reconnect and virtual-map crates rather than a channel-based callback.

use std::sync::Arc;

use crate::state::SignedState;

/// Notified exactly once per round, the instant that round's weighted
/// signature total first crosses the completion threshold.
pub trait CompleteStateConsumer: Send + Sync {
    fn on_complete(&self, state: Arc<SignedState>);
}

/// Decides whether (and how) a freshly-completed state should be persisted.
/// Out of scope: the actual on-disk writer (spec.md §1 "persistent storage
/// engines ... consumed through a narrow interface") — this trait is the
/// narrow interface, not an implementation of it.
pub trait StateSink: Send + Sync {
    fn should_save(&self, state: &SignedState);
}

/// No-op consumer for hosts that only care about signature bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConsumer;

impl CompleteStateConsumer for NoopConsumer {
    fn on_complete(&self, _state: Arc<SignedState>) {}
}

/// No-op sink; never persists anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StateSink for NoopSink {
    fn should_save(&self, _state: &SignedState) {}
}
