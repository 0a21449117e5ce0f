//! Prometheus metrics registry and helpers.
//!
//! Domain crates (e.g. `qc-state-manager::metrics`) define their own
//! `lazy_static!` collectors behind a `metrics` cargo feature and register
//! them here via [`register_collectors`]; this crate only owns the shared
//! [`Registry`], text encoding, and the histogram-timer helper.

use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static::lazy_static! {
    /// Global metrics registry shared by every crate compiled with the
    /// `metrics` feature.
    pub static ref REGISTRY: Registry = Registry::new();
}

/// Handle for the metrics registry. Dropping it does not unregister
/// metrics; it exists so `init_telemetry` has something to hold onto.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Registers metrics with the global registry. Called once per process;
/// callers from domain crates pass their own `lazy_static` collectors.
pub fn register_collectors(
    collectors: Vec<Box<dyn prometheus::core::Collector>>,
) -> Result<(), TelemetryError> {
    for metric in collectors {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// No collectors of its own; exists to give `init_telemetry` a handle.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all registered metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: prometheus::Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &prometheus::Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Counter, Histogram, HistogramOpts};

    #[test]
    fn register_and_encode_roundtrip() {
        let counter = Counter::new("qc_test_metric_total", "test counter").unwrap();
        counter.inc();
        register_collectors(vec![Box::new(counter)]).unwrap();
        let text = encode_metrics().unwrap();
        assert!(text.contains("qc_test_metric_total"));
    }

    #[test]
    fn histogram_timer_observes_on_drop() {
        let histogram =
            Histogram::with_opts(HistogramOpts::new("qc_test_duration_seconds", "test")).unwrap();
        {
            let _timer = HistogramTimer::new(&histogram);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(histogram.get_sample_count(), 1);
    }
}
