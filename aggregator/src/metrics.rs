//! Prometheus metrics for the retention engine

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

// ── Tier lifecycle ───────────────────────────────────────────────────────────

pub static TIER_FLUSH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timestrata_tier_flush_total",
        "Tier flushes by outcome",
        &["tier", "status"]
    )
    .unwrap()
});

pub static TIER_ROWS_EVICTED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timestrata_tier_rows_evicted_total",
        "Rows removed for exceeding the tier retention horizon",
        &["tier"]
    )
    .unwrap()
});

pub static SCHEMA_COLUMNS_ADDED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timestrata_schema_columns_added_total",
        "Columns added to existing tier tables",
        &["tier"]
    )
    .unwrap()
});

// ── Ingestion ────────────────────────────────────────────────────────────────

pub static INGEST_TICK_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "timestrata_ingest_tick_duration_seconds",
        "Time to fan one snapshot out to every tier",
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]
    )
    .unwrap()
});

pub static LIVE_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "timestrata_live_updates_total",
        "Sensor value updates applied to the live registry",
        &["status"]
    )
    .unwrap()
});

// ── Queries ──────────────────────────────────────────────────────────────────

pub static HISTORY_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "timestrata_history_query_duration_seconds",
        "Historical reconstruction latency per tier",
        &["tier"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap()
});

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("Metrics encoding failed: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
