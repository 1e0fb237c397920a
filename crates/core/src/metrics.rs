//! Prometheus metrics for batch runs.
//!
//! This module provides metrics for:
//! - Planning (jobs by initial status)
//! - Conversions (results, durations, in-flight workers)
//! - Runs (final status)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::warn;

/// Registry holding every batch metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

// =============================================================================
// Planning
// =============================================================================

/// Jobs planned, by status right after planning.
pub static JOBS_PLANNED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ebookbatch_jobs_planned_total", "Total jobs planned"),
        &["status"], // "pending", "skipped", "failed"
    )
    .unwrap()
});

// =============================================================================
// Conversions
// =============================================================================

/// Conversions by result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ebookbatch_conversions_total", "Total conversions attempted"),
        &["result"], // "ok", "failed", "timeout", "panicked"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ebookbatch_conversion_duration_seconds",
            "Duration of a single conversion",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 180.0, 600.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

/// Conversions currently in flight.
pub static ACTIVE_CONVERSIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ebookbatch_active_conversions",
        "Number of conversions currently running",
    )
    .unwrap()
});

// =============================================================================
// Runs
// =============================================================================

/// Finished runs by final status.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ebookbatch_runs_total", "Total runs finished"),
        &["status"], // "completed", "cancelled", "fatal_aborted"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_PLANNED.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(ACTIVE_CONVERSIONS.clone()),
        Box::new(RUNS_TOTAL.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_touched_metrics() {
        // Prometheus only outputs metrics that have been accessed
        JOBS_PLANNED.with_label_values(&["pending"]).inc_by(0);
        CONVERSIONS_TOTAL.with_label_values(&["ok"]).inc_by(0);
        CONVERSION_DURATION.with_label_values(&["ok"]).observe(0.1);
        ACTIVE_CONVERSIONS.set(0);
        RUNS_TOTAL.with_label_values(&["completed"]).inc_by(0);

        let output = render();

        assert!(output.contains("# HELP"));
        assert!(output.contains("ebookbatch_jobs_planned_total"));
        assert!(output.contains("ebookbatch_conversions_total"));
        assert!(output.contains("ebookbatch_conversion_duration_seconds"));
        assert!(output.contains("ebookbatch_active_conversions"));
        assert!(output.contains("ebookbatch_runs_total"));
    }
}
