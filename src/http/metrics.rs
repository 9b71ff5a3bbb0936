//! Request counters and the Prometheus scrape endpoint.
//!
//! Counters are recorded through the `metrics` facade. When no recorder is
//! installed (tests, `check-config`) they are no-ops.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::AppState;

/// Installs the global Prometheus recorder.
///
/// # Errors
///
/// Fails if a recorder is already installed.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

pub(crate) fn record_catalog_request(operation: &'static str) {
    counter!("storefront_catalog_requests_total", "operation" => operation).increment(1);
}

pub(crate) fn record_admin_operation(operation: &'static str) {
    counter!("storefront_admin_operations_total", "operation" => operation).increment(1);
}

pub(crate) fn record_login(outcome: &'static str) {
    counter!("storefront_logins_total", "outcome" => outcome).increment(1);
    if outcome != "success" {
        counter!("storefront_auth_failures_total", "reason" => outcome).increment(1);
    }
}

/// GET /metrics - Prometheus text exposition.
pub(crate) async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
