//! Prometheus Metrics Module
//!
//! Pre-registered metrics for the analysis service.

use lazy_static::lazy_static;
use prometheus::{
    opts, register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder,
    HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // --- Pipeline Metrics ---

    /// Pipeline runs (by trigger and outcome)
    pub static ref PIPELINE_RUNS: IntCounterVec = register_int_counter_vec!(
        opts!("corrnet_pipeline_runs_total", "Analysis pipeline runs"),
        &["trigger", "outcome"]
    ).expect("FATAL: Failed to register PIPELINE_RUNS metric - check for duplicate registration");

    /// Pipeline latency in seconds (fetch + compute)
    pub static ref PIPELINE_LATENCY: HistogramVec = register_histogram_vec!(
        "corrnet_pipeline_latency_seconds",
        "Analysis pipeline latency",
        &["trigger"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).expect("FATAL: Failed to register PIPELINE_LATENCY metric - check for duplicate registration");

    // --- Cache Metrics ---

    /// Cache lookups (hit, miss, expired)
    pub static ref CACHE_LOOKUPS: IntCounterVec = register_int_counter_vec!(
        opts!("corrnet_cache_lookups_total", "Result cache lookups"),
        &["outcome"]
    ).expect("FATAL: Failed to register CACHE_LOOKUPS metric - check for duplicate registration");

    // --- Live Stream Metrics ---

    /// Currently open live streams
    pub static ref ACTIVE_STREAMS: IntGauge = register_int_gauge!(
        opts!("corrnet_live_streams_active", "Open live streams")
    ).expect("FATAL: Failed to register ACTIVE_STREAMS metric - check for duplicate registration");

    /// Events pushed to live stream subscribers
    pub static ref STREAM_EVENTS: IntCounterVec = register_int_counter_vec!(
        opts!("corrnet_live_stream_events_total", "Live stream events sent"),
        &["event"]
    ).expect("FATAL: Failed to register STREAM_EVENTS metric - check for duplicate registration");
}

/// Record a finished pipeline run
pub fn record_pipeline_run(trigger: &str, outcome: &str, latency_secs: f64) {
    PIPELINE_RUNS.with_label_values(&[trigger, outcome]).inc();
    PIPELINE_LATENCY
        .with_label_values(&[trigger])
        .observe(latency_secs);
}

pub fn record_cache_lookup(outcome: &str) {
    CACHE_LOOKUPS.with_label_values(&[outcome]).inc();
}

pub fn record_stream_event(event: &str) {
    STREAM_EVENTS.with_label_values(&[event]).inc();
}

pub fn active_streams() -> i64 {
    ACTIVE_STREAMS.get()
}

/// Keeps the active-stream gauge raised while alive
#[derive(Debug)]
pub struct ActiveStreamGuard {
    gauge: IntGauge,
}

impl ActiveStreamGuard {
    pub fn new() -> Self {
        Self::on(&ACTIVE_STREAMS)
    }

    /// Guard over an arbitrary gauge
    pub fn on(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self {
            gauge: gauge.clone(),
        }
    }
}

impl Default for ActiveStreamGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Get metrics as text for /metrics endpoint
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode Prometheus metrics: {}", e);
        return String::new();
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Prometheus metrics buffer is not valid UTF-8: {}", e);
            String::new()
        }
    }
}
