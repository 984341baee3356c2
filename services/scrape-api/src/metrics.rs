//! Prometheus metrics exposition
//!
//! - `gateway_requests_total` (counter): labels `route`, `status`
//! - `gateway_request_duration_seconds` (histogram): label `route`
//! - `gateway_upstream_errors_total` (counter): label `kind`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering.
///
/// The duration histogram gets explicit buckets (5 ms to 60 s, the span
/// of the operation deadlines) so it renders `_bucket` lines instead of
/// summary quantiles.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "gateway_request_duration_seconds".to_string(),
            ),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed API request.
pub fn record_request(route: &'static str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(duration_secs);
}

/// Record a classified upstream failure.
pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}
