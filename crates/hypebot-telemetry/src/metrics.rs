//! Prometheus metrics for HypeBot.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. Registration only fails on duplicate
//! metric names, which is a programming error caught on first access.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

/// Reconciliation outcomes.
/// Labels: outcome (converged/order_placed/market_data/order_rejected/store)
pub static RECONCILIATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hypebot_reconciliations_total",
        "Reconciliation attempts by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Reconciliation latency in seconds.
pub static RECONCILE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hypebot_reconcile_duration_seconds",
        "Wall time of one reconciliation attempt",
        &["pair", "outcome"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

/// Orders accepted by the exchange.
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hypebot_orders_placed_total",
        "Orders accepted by the exchange",
        &["pair", "side"]
    )
    .unwrap()
});

/// Resting orders cancelled before a new submission.
pub static ORDERS_CANCELLED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hypebot_orders_cancelled_total",
        "Resting orders cancelled",
        &["pair"]
    )
    .unwrap()
});

/// Stale cache values served after a failed refresh.
pub static CACHE_STALE_SERVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hypebot_cache_stale_served_total",
        "Expired cache entries served because the live fetch failed",
        &["resource"]
    )
    .unwrap()
});

/// Live fetches that failed, whether or not a stale value was available.
pub static CACHE_FETCH_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hypebot_cache_fetch_failed_total",
        "Live exchange fetches that failed",
        &["resource"]
    )
    .unwrap()
});

/// Full cache invalidations after mutations.
pub static CACHE_INVALIDATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hypebot_cache_invalidations_total",
        "Whole-cache invalidations after successful mutations"
    )
    .unwrap()
});

/// Bots currently reconciling.
pub static BOTS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("hypebot_bots_running", "Bots currently reconciling").unwrap()
});

/// Executions skipped because the bot was already running.
pub static EXECUTIONS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hypebot_executions_skipped_total",
        "executeBot calls that found the bot already running"
    )
    .unwrap()
});

/// Delayed retries scheduled.
pub static RETRIES_SCHEDULED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hypebot_retries_scheduled_total",
        "Delayed re-executions scheduled after non-convergence"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a reconciliation outcome.
    pub fn reconciliation(outcome: &str) {
        RECONCILIATIONS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn reconcile_duration(pair: &str, outcome: &str, seconds: f64) {
        RECONCILE_DURATION_SECONDS
            .with_label_values(&[pair, outcome])
            .observe(seconds);
    }

    pub fn order_placed(pair: &str, side: &str) {
        ORDERS_PLACED_TOTAL.with_label_values(&[pair, side]).inc();
    }

    pub fn orders_cancelled(pair: &str, count: usize) {
        ORDERS_CANCELLED_TOTAL
            .with_label_values(&[pair])
            .inc_by(count as f64);
    }

    pub fn cache_stale_served(resource: &str) {
        CACHE_STALE_SERVED_TOTAL.with_label_values(&[resource]).inc();
    }

    pub fn cache_fetch_failed(resource: &str) {
        CACHE_FETCH_FAILED_TOTAL.with_label_values(&[resource]).inc();
    }

    pub fn cache_invalidated() {
        CACHE_INVALIDATIONS_TOTAL.inc();
    }

    pub fn bot_started() {
        BOTS_RUNNING.inc();
    }

    pub fn bot_finished() {
        BOTS_RUNNING.dec();
    }

    pub fn execution_skipped() {
        EXECUTIONS_SKIPPED_TOTAL.inc();
    }

    pub fn retry_scheduled() {
        RETRIES_SCHEDULED_TOTAL.inc();
    }
}

/// Render the default registry in the Prometheus text format.
pub fn encode_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
