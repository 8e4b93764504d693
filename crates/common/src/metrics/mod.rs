//! Metrics and observability utilities
//!
//! Prometheus-style metrics for the extraction pipeline and the HTTP gateway,
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all QuizForge metrics
pub const METRICS_PREFIX: &str = "quizforge";

/// Buckets for whole-document pipeline duration (in seconds)
pub const PIPELINE_BUCKETS: &[f64] = &[
    0.5,
    1.0,
    2.5,
    5.0,
    10.0,
    30.0,
    60.0,
    120.0,
    300.0,
    600.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
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

    // Pipeline metrics
    describe_counter!(
        format!("{}_textbooks_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Textbooks that reached a terminal processing state"
    );

    describe_histogram!(
        format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Whole-document extraction latency in seconds"
    );

    describe_counter!(
        format!("{}_pages_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Pages whose text was read and scanned for questions"
    );

    describe_counter!(
        format!("{}_page_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Pages skipped because text extraction failed"
    );

    describe_counter!(
        format!("{}_questions_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Question candidates produced by extraction"
    );

    describe_counter!(
        format!("{}_questions_persisted_total", METRICS_PREFIX),
        Unit::Count,
        "Question candidates committed to storage"
    );

    describe_counter!(
        format!("{}_batch_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Outline or question batches rolled back"
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

/// Record the outcome of one chunk of pages
pub fn record_chunk(pages_processed: usize, page_failures: usize, extracted: usize, persisted: usize) {
    counter!(format!("{}_pages_processed_total", METRICS_PREFIX)).increment(pages_processed as u64);
    counter!(format!("{}_page_failures_total", METRICS_PREFIX)).increment(page_failures as u64);
    counter!(format!("{}_questions_extracted_total", METRICS_PREFIX)).increment(extracted as u64);
    counter!(format!("{}_questions_persisted_total", METRICS_PREFIX)).increment(persisted as u64);
}

/// Record a rolled-back batch
pub fn record_batch_failure(kind: &str) {
    counter!(
        format!("{}_batch_failures_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a pipeline reaching a terminal state
pub fn record_pipeline(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_textbooks_processed_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in PIPELINE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls must be no-ops
        let metrics = RequestMetrics::start("GET", "/v1/textbooks");
        metrics.finish(200);
        record_chunk(10, 1, 4, 4);
        record_batch_failure("questions");
        record_pipeline(1.5, "completed");
    }
}
