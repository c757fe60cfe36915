use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct GatewayStatus {
    pub version: &'static str,
    pub auth_provider: Option<&'static str>,
    pub config_version: Option<String>,
    pub config_fetched_at: Option<DateTime<Utc>>,
    pub config_stale: bool,
    pub audit_enabled: bool,
    pub audit_dropped: u64,
    pub audit_queue_depth: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<GatewayStatus> {
    let cached = state.sync.current();

    Json(GatewayStatus {
        version: env!("CARGO_PKG_VERSION"),
        auth_provider: state.gateway.provider().map(|p| p.as_str()),
        config_version: cached.as_ref().map(|c| c.snapshot.version.clone()),
        config_fetched_at: cached.as_ref().map(|c| c.fetched_at),
        config_stale: cached
            .as_ref()
            .map_or(true, |c| c.is_stale(state.sync.stale_after())),
        audit_enabled: state.audit.is_enabled(),
        audit_dropped: state.audit.dropped(),
        audit_queue_depth: state.audit.queue_depth(),
    })
}

/// The active snapshot with secrets masked.
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.sync.current() {
        Some(cached) => Json(cached.snapshot.redacted()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no configuration loaded" })),
        )
            .into_response(),
    }
}
