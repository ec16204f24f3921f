//! Metrics and observability utilities
//!
//! Prometheus metric names share the `automarks` prefix. Handlers and the
//! ingestion worker record through the helpers here instead of naming metrics
//! ad hoc.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all AutoMarks metrics
pub const METRICS_PREFIX: &str = "automarks";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Exports scan whole semesters and run slower
pub const EXPORT_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 30.00];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_analytics_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total analytics computations by kind"
    );

    describe_histogram!(
        format!("{}_analytics_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Analytics computation latency in seconds"
    );

    describe_gauge!(
        format!("{}_analytics_rows_scanned", METRICS_PREFIX),
        Unit::Count,
        "Result rows read by the last analytics computation"
    );

    describe_counter!(
        format!("{}_exports_total", METRICS_PREFIX),
        Unit::Count,
        "Total exports by format"
    );

    describe_histogram!(
        format!("{}_export_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Export generation latency in seconds"
    );

    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Extracted result documents processed by outcome"
    );

    describe_counter!(
        format!("{}_subject_results_saved_total", METRICS_PREFIX),
        Unit::Count,
        "Subject results written to the store"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-document ingestion latency in seconds"
    );

    describe_counter!(
        format!("{}_marks_inconsistencies_total", METRICS_PREFIX),
        Unit::Count,
        "Rows whose total differs from internal plus external"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_analytics(kind: &'static str, duration_secs: f64, rows_scanned: usize) {
    counter!(format!("{}_analytics_queries_total", METRICS_PREFIX), "kind" => kind).increment(1);

    histogram!(format!("{}_analytics_duration_seconds", METRICS_PREFIX), "kind" => kind)
        .record(duration_secs);

    gauge!(format!("{}_analytics_rows_scanned", METRICS_PREFIX), "kind" => kind)
        .set(rows_scanned as f64);
}

pub fn record_inconsistencies(count: usize) {
    if count > 0 {
        counter!(format!("{}_marks_inconsistencies_total", METRICS_PREFIX)).increment(count as u64);
    }
}

pub fn record_export(format: &'static str, duration_secs: f64) {
    counter!(format!("{}_exports_total", METRICS_PREFIX), "format" => format).increment(1);

    histogram!(format!("{}_export_duration_seconds", METRICS_PREFIX), "format" => format)
        .record(duration_secs);
}

/// Helper to record ingestion metrics for one document
pub fn record_ingestion(duration_secs: f64, subjects_saved: usize, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    if success {
        counter!(format!("{}_subject_results_saved_total", METRICS_PREFIX))
            .increment(subjects_saved as u64);

        histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    }
}
