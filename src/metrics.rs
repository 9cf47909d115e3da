use crate::error::AppError;
use lazy_static::lazy_static;
use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
}

fn metric_error(name: &str, e: prometheus::Error) -> AppError {
    AppError::Config(format!("Failed to create {} metric: {}", name, e))
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> Result<IntCounterVec, AppError> {
    IntCounterVec::new(Opts::new(name, help), labels).map_err(|e| metric_error(name, e))
}

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> Result<IntGaugeVec, AppError> {
    IntGaugeVec::new(Opts::new(name, help), labels).map_err(|e| metric_error(name, e))
}

fn histogram(name: &str, help: &str, buckets: Vec<f64>) -> Result<Histogram, AppError> {
    Histogram::with_opts(HistogramOpts::new(name, help).buckets(buckets))
        .map_err(|e| metric_error(name, e))
}

// Metric definitions are static; construction only fails on malformed names.
lazy_static! {
    pub static ref NOTIFICATIONS_RECEIVED: IntCounterVec = counter_vec(
        "whale_tracker_notifications_received_total",
        "Streamed transaction notifications received",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref JOBS_ENQUEUED: IntCounterVec = counter_vec(
        "whale_tracker_jobs_enqueued_total",
        "Processing jobs enqueued, one per matched address",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref DUPLICATES_DROPPED: IntCounterVec = counter_vec(
        "whale_tracker_duplicates_dropped_total",
        "Notifications dropped because the signature was already claimed",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref SWAPS_STORED: IntCounterVec = counter_vec(
        "whale_tracker_swaps_stored_total",
        "Swap outcomes persisted",
        &["cohort", "kind"]
    ).expect("static metric definition");
    pub static ref ERASES_TOTAL: IntCounterVec = counter_vec(
        "whale_tracker_erases_total",
        "Transactions that produced no swap, by reason",
        &["cohort", "reason"]
    ).expect("static metric definition");
    pub static ref FETCH_RETRIES: IntCounterVec = counter_vec(
        "whale_tracker_fetch_retries_total",
        "Transaction fetch retries after transient failures",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref STREAM_RECONNECTIONS: IntCounterVec = counter_vec(
        "whale_tracker_stream_reconnections_total",
        "Stream reconnection attempts",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref STREAM_CONNECTED: IntGaugeVec = gauge_vec(
        "whale_tracker_stream_connected",
        "Stream connection status (1=connected, 0=disconnected)",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref QUEUE_DEPTH: IntGaugeVec = gauge_vec(
        "whale_tracker_queue_depth",
        "Jobs waiting for a worker",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref MONITORED_ADDRESSES: IntGaugeVec = gauge_vec(
        "whale_tracker_monitored_addresses",
        "Addresses in the current snapshot",
        &["cohort"]
    ).expect("static metric definition");
    pub static ref JOB_PROCESSING_TIME: Histogram = histogram(
        "whale_tracker_job_processing_seconds",
        "Time from job dequeue to outcome",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).expect("static metric definition");
    pub static ref DATABASE_OPERATION_TIME: Histogram = histogram(
        "whale_tracker_database_operation_seconds",
        "Time taken for database operations",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).expect("static metric definition");
    pub static ref APP_UPTIME: Gauge = Gauge::new(
        "whale_tracker_uptime_seconds",
        "Application uptime in seconds"
    ).expect("static metric definition");
    pub static ref LAST_SWAP_TIMESTAMP: Gauge = Gauge::new(
        "whale_tracker_last_swap_timestamp",
        "Unix timestamp of the last stored swap"
    ).expect("static metric definition");
    pub static ref INTAKE_ERRORS: IntCounter = IntCounter::new(
        "whale_tracker_intake_errors_total",
        "Notifications whose claim or enqueue failed"
    ).expect("static metric definition");
}

/// Register every metric with the registry. Fails fast at startup if the
/// monitoring system cannot be initialized.
pub fn init_metrics() -> Result<(), AppError> {
    let collectors: Vec<(&str, Box<dyn prometheus::core::Collector>)> = vec![
        ("notifications_received", Box::new(NOTIFICATIONS_RECEIVED.clone())),
        ("jobs_enqueued", Box::new(JOBS_ENQUEUED.clone())),
        ("duplicates_dropped", Box::new(DUPLICATES_DROPPED.clone())),
        ("swaps_stored", Box::new(SWAPS_STORED.clone())),
        ("erases_total", Box::new(ERASES_TOTAL.clone())),
        ("fetch_retries", Box::new(FETCH_RETRIES.clone())),
        ("stream_reconnections", Box::new(STREAM_RECONNECTIONS.clone())),
        ("stream_connected", Box::new(STREAM_CONNECTED.clone())),
        ("queue_depth", Box::new(QUEUE_DEPTH.clone())),
        ("monitored_addresses", Box::new(MONITORED_ADDRESSES.clone())),
        ("job_processing_time", Box::new(JOB_PROCESSING_TIME.clone())),
        ("database_operation_time", Box::new(DATABASE_OPERATION_TIME.clone())),
        ("app_uptime", Box::new(APP_UPTIME.clone())),
        ("last_swap_timestamp", Box::new(LAST_SWAP_TIMESTAMP.clone())),
        ("intake_errors", Box::new(INTAKE_ERRORS.clone())),
    ];
    for (name, collector) in collectors {
        REGISTRY
            .register(collector)
            .map_err(|e| AppError::Config(format!("Failed to register {}: {}", name, e)))?;
    }
    Ok(())
}

/// Get the metrics in Prometheus exposition format.
pub fn gather_metrics() -> Result<String, AppError> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Config(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| AppError::Config(format!("Failed to convert metrics to UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_counters_accumulate_per_reason() {
        ERASES_TOTAL.with_label_values(&["whale", "usd_filter"]).inc();
        ERASES_TOTAL.with_label_values(&["whale", "usd_filter"]).inc();
        assert!(ERASES_TOTAL.with_label_values(&["whale", "usd_filter"]).get() >= 2);
    }
}
