//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

/// Describe all custom metrics
fn register_metrics() {
    metrics::describe_counter!(
        "tollgate_requests_total",
        "Total number of forward requests by provider and outcome"
    );
    metrics::describe_histogram!(
        "tollgate_request_duration_seconds",
        "Forward request duration in seconds"
    );
    metrics::describe_counter!(
        "tollgate_rejections_total",
        "Requests rejected before dispatch, by reason"
    );
    metrics::describe_counter!(
        "tollgate_usage_units_total",
        "Usage units recorded, by kind"
    );
}

/// Prometheus metrics endpoint handler
///
/// Returns metrics in Prometheus text format for scraping.
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a finished forward request
pub fn record_request(provider: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "tollgate_requests_total",
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("tollgate_request_duration_seconds", "provider" => provider.to_string())
        .record(duration_secs);
}

/// Record a request rejected before dispatch
pub fn record_rejection(reason: &str) {
    metrics::counter!("tollgate_rejections_total", "reason" => reason.to_string()).increment(1);
}

/// Record usage units accounted
pub fn record_usage(kind: &str, amount: u64) {
    metrics::counter!("tollgate_usage_units_total", "kind" => kind.to_string()).increment(amount);
}
