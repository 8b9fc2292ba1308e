//! Prometheus metrics exposition
//!
//! The proxy's own service metrics (not the console's metrics-store
//! datasource, which is just another proxied upstream):
//!
//! - `proxy_requests_total` (counter): labels `status`, `method`
//! - `proxy_request_duration_seconds` (histogram): label `status`
//! - `proxy_upstream_errors_total` (counter): labels `error_type`, `route`
//! - `proxy_unrouted_requests_total` (counter): paths no route owns

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram buckets from 5ms to 60s, matching the configurable upstream
/// timeout range. Without explicit buckets the exporter renders summaries,
/// which breaks `histogram_quantile()` dashboards.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` produces the text exposition format served on
/// `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "proxy_request_duration_seconds".to_string(),
            ),
            DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed proxy request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("proxy_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

/// Record an upstream error, labelled with its kind and the owning route.
pub fn record_upstream_error(error_type: &str, route: &str) {
    metrics::counter!(
        "proxy_upstream_errors_total",
        "error_type" => error_type.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
}

/// Record a request whose path no route owns.
pub fn record_unrouted() {
    metrics::counter!("proxy_unrouted_requests_total").increment(1);
}
