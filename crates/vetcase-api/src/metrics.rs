//! Prometheus metrics for monitoring API performance and health.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics exporter.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("http_request_duration_seconds".to_string()),
        &[
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ],
    )?;

    let handle = builder.install_recorder()?;
    Ok(handle)
}

/// Middleware recording request counts and durations.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response: Response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(duration);

    response
}

/// Replace numeric path segments with a placeholder so ids don't blow up
/// label cardinality.
fn normalize_path(path: &str) -> String {
    let number_regex = regex::Regex::new(r"/\d+").unwrap();
    number_regex.replace_all(path, "/:id").to_string()
}

/// Handler for the `/metrics` endpoint.
pub async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// Record a case submission grading outcome.
pub fn record_case_submission(diagnosis_correct: bool) {
    let diagnosis = if diagnosis_correct { "correct" } else { "incorrect" };
    counter!(
        "case_submissions_total",
        "diagnosis" => diagnosis.to_string()
    )
    .increment(1);
}

/// Record payment gateway interactions.
pub fn record_payment_event(event_type: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "payment_events_total",
        "type" => event_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
