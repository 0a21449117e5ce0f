//! # Shared Bus — Wiring Mesh
//!
//! Scheduler kinds and bounded typed channels connecting the consensus
//! components to each other, per spec.md §5: "parallel threads cooperating
//! through bounded, typed queues (a 'wiring' mesh)". This generalizes the
//! single shared event-topic bus this workspace used to have into typed
//! per-edge [`Wire`]s, each owned by exactly one [`Scheduler`].
//!
//! Cooperative cancellation across the mesh uses
//! [`tokio_util::sync::CancellationToken`], re-exported here so downstream
//! crates depend on one place for it.

pub mod channel;
pub mod rate_limiter;
pub mod scheduler;

pub use channel::{Wire, WireError};
pub use rate_limiter::RateLimiter;
pub use scheduler::{Pump, Scheduler};
pub use tokio_util::sync::CancellationToken;

/// Default bound for a wiring edge when a component doesn't have a more
/// specific backpressure window from its own config (spec.md §6
/// `gossip.max_outstanding_events` and similar are preferred where they
/// exist).
pub const DEFAULT_WIRE_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_positive() {
        assert!(DEFAULT_WIRE_CAPACITY > 0);
    }

    #[tokio::test]
    async fn cancellation_token_propagates_to_children() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
