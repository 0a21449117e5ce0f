//! Event creator configuration (spec.md §4.4, §9 "pass config, not hardcode").

use qc_event_core::EventLimits;
use std::time::Duration;

/// Mirrors `ConsensusConfig` in structure: one struct carrying every tunable
/// of the creation tick, injected rather than hardcoded.
#[derive(Debug, Clone)]
pub struct EventCreatorConfig {
    /// Minimum wall-clock interval between two events from the same
    /// creator; a tick arriving sooner is throttled (spec.md §4.4
    /// "Throughput bound").
    pub min_tick_interval: Duration,
    /// Probability weight floor given to every other-parent candidate so
    /// that zero-weight nodes remain occasionally selectable even when
    /// they never strictly improve the advancement score (spec.md §4.2
    /// "Key design point", §8 property 4). Exposed as
    /// `tipset.zero_weight_bias` in the external configuration surface.
    pub zero_weight_bias: f64,
    pub limits: EventLimits,
}

impl Default for EventCreatorConfig {
    fn default() -> Self {
        Self {
            min_tick_interval: Duration::from_millis(100),
            zero_weight_bias: 0.05,
            limits: EventLimits::default(),
        }
    }
}
