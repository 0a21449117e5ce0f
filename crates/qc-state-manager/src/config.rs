//! Signed-state manager configuration, spec.md §6 recognized options
//! (`state.retention_window`, `state.sentinel_leak_ttl`).

use std::time::Duration;

/// Tunables for [`crate::SignedStateManager`] and its background
/// [`crate::GarbageCollector`]/[`crate::LeakSentinel`] tasks.
#[derive(Debug, Clone)]
pub struct StateManagerConfig {
    /// Rounds at or below `latest_immutable_round - retention_window` are
    /// evicted (spec.md §4.10 point 5). Also bounds how late a signature
    /// may arrive for an older round (spec.md §5 "late-arriving signatures
    /// are accepted up to the retention window").
    pub retention_window: u64,
    /// Numerator/denominator of the weighted-signature threshold a round
    /// must cross to become *complete* (spec.md §4.10 point 4). Default is
    /// 1/3: under the usual BFT assumption of fewer than a third malicious
    /// weight, a third of honest signatures is already enough to certify a
    /// state, matching the threshold this workspace's consensus crates use
    /// for strong-minority certification rather than a full majority.
    pub signature_threshold_numerator: u64,
    pub signature_threshold_denominator: u64,
    /// How long a reservation may be held before the sentinel logs a
    /// diagnostic (spec.md §6 `state.sentinel_leak_ttl`).
    pub sentinel_leak_ttl: Duration,
    /// How often the sentinel sweeps for leaked reservations.
    pub sentinel_sweep_interval: Duration,
    /// Bound on the background collector's release queue (spec.md §4.10
    /// "on a bounded queue").
    pub release_queue_capacity: usize,
}

impl Default for StateManagerConfig {
    fn default() -> Self {
        Self {
            retention_window: 26,
            signature_threshold_numerator: 1,
            signature_threshold_denominator: 3,
            sentinel_leak_ttl: Duration::from_secs(300),
            sentinel_sweep_interval: Duration::from_secs(30),
            release_queue_capacity: 1024,
        }
    }
}
