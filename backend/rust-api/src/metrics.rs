use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec, Encoder,
    HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business metrics
    pub static ref ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempts_total",
        "Attempt lifecycle events",
        &["event"] // started / closed / refund_issued
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of answers submitted",
        &["result"] // accepted / rejected
    )
    .unwrap();

    pub static ref LEDGER_ENTRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_entries_total",
        "Ledger entries appended, by reason",
        &["reason"]
    )
    .unwrap();

    pub static ref LEDGER_REPLAYS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ledger_replays_total",
        "Ledger writes absorbed by reference-id idempotency",
        &["reason"]
    )
    .unwrap();

    pub static ref REPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reports_total",
        "Question reports, by status reached",
        &["status"]
    )
    .unwrap();

    pub static ref TIMEOUT_SWEEPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "timeout_sweeps_total",
        "Idle timeout worker sweeps",
        &["status"] // ok / error
    )
    .unwrap();

    // Cache metrics (Redis balance cache)
    pub static ref BALANCE_CACHE: CounterVec = register_counter_vec!(
        "balance_cache_requests",
        "Balance cache hit/miss",
        &["result"]
    )
    .unwrap();
}

pub fn record_balance_cache_hit() {
    BALANCE_CACHE.with_label_values(&["hit"]).inc();
}

pub fn record_balance_cache_miss() {
    BALANCE_CACHE.with_label_values(&["miss"]).inc();
}

pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
