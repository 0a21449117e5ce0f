//! Gossip session configuration, spec.md §6 recognized options
//! (`gossip.max_outstanding_events`) and §5 (session deadlines).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Backpressure window: the sender must not have more than this many
    /// events in flight un-acknowledged (spec.md §4.5 "Backpressure").
    pub max_outstanding_events: usize,
    /// Overall session deadline; overshoot aborts with `Timeout` (spec.md §5).
    pub session_deadline: Duration,
    /// Starting backoff delay for peer re-dial after a transport failure.
    pub redial_initial_backoff: Duration,
    /// Ceiling on the re-dial backoff (spec.md §4.5 "capped at a
    /// configurable ceiling").
    pub redial_max_backoff: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            max_outstanding_events: 1024,
            session_deadline: Duration::from_secs(30),
            redial_initial_backoff: Duration::from_millis(500),
            redial_max_backoff: Duration::from_secs(60),
        }
    }
}
