//! Metrics and observability utilities
//!
//! Prometheus metrics with SLO-aligned histograms and standardized naming
//! conventions. All names share the `rpms_` prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all RPMS metrics
pub const METRICS_PREFIX: &str = "rpms";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
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

    // Workflow metrics
    describe_counter!(
        format!("{}_workflow_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Paper workflow operations that changed state"
    );

    describe_counter!(
        format!("{}_publication_ids_allocated_total", METRICS_PREFIX),
        Unit::Count,
        "Publication identifiers handed out by the counter"
    );

    // Fan-out metrics
    describe_counter!(
        format!("{}_notifications_delivered_total", METRICS_PREFIX),
        Unit::Count,
        "Notification rows written by fan-out"
    );

    describe_counter!(
        format!("{}_notifications_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Recipients or audiences that fan-out could not deliver to"
    );

    describe_histogram!(
        format!("{}_fanout_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time from fan-out start to the last insert"
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

/// Count a workflow operation that changed a paper
pub fn record_transition(operation: &str, status: &str) {
    counter!(
        format!("{}_workflow_transitions_total", METRICS_PREFIX),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_publication_id_allocated() {
    counter!(format!("{}_publication_ids_allocated_total", METRICS_PREFIX)).increment(1);
}

/// Record the outcome of one fan-out plan
pub fn record_fanout(duration_secs: f64, delivered: usize, failed: usize) {
    counter!(format!("{}_notifications_delivered_total", METRICS_PREFIX))
        .increment(delivered as u64);

    if failed > 0 {
        counter!(format!("{}_notifications_failed_total", METRICS_PREFIX))
            .increment(failed as u64);
    }

    histogram!(format!("{}_fanout_duration_seconds", METRICS_PREFIX)).record(duration_secs);
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

        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.150));
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/api/v1/papers");
        metrics.finish(200);
        record_transition("recommend_paper", "recommended_for_publication");
        record_fanout(0.01, 3, 1);
    }
}
