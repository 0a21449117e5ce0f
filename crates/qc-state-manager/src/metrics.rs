//! Prometheus collectors for the signed-state manager, gated behind the
//! `metrics` feature: a `lazy_static!` block of collectors plus a
//! `register()` call the host wires into
//! `quantum_telemetry::register_collectors` once at startup.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntGauge};

lazy_static! {
    pub static ref LATEST_COMPLETE_ROUND: IntGauge = IntGauge::new(
        "qc_state_manager_latest_complete_round",
        "Highest round number whose signed state has crossed the completion threshold"
    )
    .unwrap();
    pub static ref RESERVATIONS_ACTIVE: IntGauge = IntGauge::new(
        "qc_state_manager_reservations_active",
        "Number of currently-held named reservations across all tracked rounds"
    )
    .unwrap();
    pub static ref LEAKS_DETECTED_TOTAL: IntCounter = IntCounter::new(
        "qc_state_manager_leaks_detected_total",
        "Reservations the sentinel found held past state.sentinel_leak_ttl"
    )
    .unwrap();
}

/// Registers this crate's collectors. Call once at startup, typically right
/// before `quantum_telemetry::init_telemetry`'s metrics step.
pub fn collectors() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(LATEST_COMPLETE_ROUND.clone()),
        Box::new(RESERVATIONS_ACTIVE.clone()),
        Box::new(LEAKS_DETECTED_TOTAL.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collectors_are_constructible() {
        assert_eq!(collectors().len(), 3);
    }
}
