//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by path, method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_config_fetch_total` (counter): snapshot fetches by result
//! - `gateway_audit_dropped_total` (counter): audit entries lost to overflow
//! - `gateway_auth_denied_total` (counter): denials by reason
//!
//! The recorder is an instance handed to every component that records,
//! never installed as the process-global recorder.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use metrics::{Key, Label, Level, Metadata, Recorder};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION: &str = "gateway_request_duration_seconds";
pub const CONFIG_FETCH_TOTAL: &str = "gateway_config_fetch_total";
pub const AUDIT_DROPPED_TOTAL: &str = "gateway_audit_dropped_total";
pub const AUTH_DENIED_TOTAL: &str = "gateway_auth_denied_total";

/// Buckets tuned for an auth hop in front of typical web latencies.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Shared handle to the gateway's metrics registry.
#[derive(Clone)]
pub struct MetricsRecorder {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    /// Create a fresh registry.
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();

        Ok(Self {
            recorder: Arc::new(recorder),
            handle,
        })
    }

    /// Record a completed request.
    pub fn observe_request(&self, path: &str, method: &str, status: u16, elapsed: Duration) {
        let labels = vec![
            Label::new("path", path.to_string()),
            Label::new("method", method.to_string()),
            Label::new("status", status.to_string()),
        ];

        self.recorder
            .register_counter(&Key::from_parts(REQUESTS_TOTAL, labels.clone()), &metadata())
            .increment(1);
        self.recorder
            .register_histogram(&Key::from_parts(REQUEST_DURATION, labels), &metadata())
            .record(elapsed.as_secs_f64());
    }

    /// Record the outcome of a control-plane fetch.
    pub fn record_config_fetch(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        let key = Key::from_parts(CONFIG_FETCH_TOTAL, vec![Label::new("result", result)]);
        self.recorder.register_counter(&key, &metadata()).increment(1);
    }

    /// Record an audit entry dropped because the queue was full.
    pub fn record_audit_dropped(&self) {
        let key = Key::from_name(AUDIT_DROPPED_TOTAL);
        self.recorder.register_counter(&key, &metadata()).increment(1);
    }

    /// Record an authentication or authorization denial.
    pub fn record_auth_denied(&self, reason: &'static str) {
        let key = Key::from_parts(AUTH_DENIED_TOTAL, vec![Label::new("reason", reason)]);
        self.recorder.register_counter(&key, &metadata()).increment(1);
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

/// Scrape surface, served on its own listener.
pub fn metrics_router(recorder: MetricsRecorder) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(recorder)
}

async fn render_metrics(State(recorder): State<MetricsRecorder>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        recorder.render(),
    )
}
