//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all DocLens metrics
pub const METRICS_PREFIX: &str = "doclens";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
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

    // Sharing metrics
    describe_counter!(
        format!("{}_shares_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total share grants and links created"
    );

    describe_counter!(
        format!("{}_share_claims_total", METRICS_PREFIX),
        Unit::Count,
        "Total share-link claim attempts by outcome"
    );

    // Duplication metrics
    describe_counter!(
        format!("{}_duplications_total", METRICS_PREFIX),
        Unit::Count,
        "Total analysis duplications"
    );

    describe_counter!(
        format!("{}_duplication_file_warnings_total", METRICS_PREFIX),
        Unit::Count,
        "Files whose blob copy failed during duplication"
    );

    // Storage metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Total file uploads accepted"
    );

    describe_histogram!(
        format!("{}_upload_bytes", METRICS_PREFIX),
        Unit::Bytes,
        "Uploaded file sizes in bytes"
    );

    // Upstream LLM metrics
    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total LLM proxy requests by status"
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

/// Record a share grant or link creation ("email" / "link")
pub fn record_share_created(kind: &str) {
    counter!(
        format!("{}_shares_created_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a claim attempt ("granted" / "repeat" / "owner" / "gone")
pub fn record_share_claim(outcome: &str) {
    counter!(
        format!("{}_share_claims_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a completed duplication and any file-copy warnings
pub fn record_duplication(warning_count: usize) {
    counter!(format!("{}_duplications_total", METRICS_PREFIX)).increment(1);
    if warning_count > 0 {
        counter!(format!("{}_duplication_file_warnings_total", METRICS_PREFIX))
            .increment(warning_count as u64);
    }
}

/// Record an accepted upload
pub fn record_upload(size_bytes: usize) {
    counter!(format!("{}_uploads_total", METRICS_PREFIX)).increment(1);
    histogram!(format!("{}_upload_bytes", METRICS_PREFIX)).record(size_bytes as f64);
}

/// Record an LLM proxy request ("ok" / "upstream_error" / "unconfigured")
pub fn record_llm_request(status: &str) {
    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (250ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/api/analyses");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
