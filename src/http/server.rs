//! HTTP server setup and configuration.
//!
//! # Layers (outermost first)
//! ```text
//! request id → trace → propagate id → observe → timeout → concurrency limit
//!     → /healthz                         (public)
//!     → certificate → authenticate → policy → /whoami, /admin/*
//! ```
//!
//! `observe` reads the [`AccessOutcome`] the auth middleware leaves on the
//! response and turns it into an audit entry and metrics. It sits outside the
//! timeout so a request cut off at `request_timeout_secs` is still counted and
//! audited as a denial.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, MatchedPath, State},
    http::{
        header::{HOST, USER_AGENT},
        HeaderMap, Request, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::audit::{AuditPipeline, HttpDetails};
use crate::auth::certificate::attach_certificate;
use crate::auth::policy::enforce_policy;
use crate::auth::{authenticate_request, AccessOutcome, AccessPolicy, AuthorizationGateway, CertificateFact, Identity};
use crate::config::{ConfigSynchronizer, GatewayConfig};
use crate::observability::MetricsRecorder;

const X_REQUEST_ID: &str = "x-request-id";
const REQUEST_TIMEOUT_REASON: &str = "request_timeout";

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AuthorizationGateway>,
    pub sync: Arc<ConfigSynchronizer>,
    pub audit: AuditPipeline,
    pub metrics: MetricsRecorder,
}

/// The gateway's HTTP surface.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let certificate = Arc::new(config.certificate.clone());
        let policy = Arc::new(AccessPolicy::new(&config.access.rules));

        let mut protected = Router::new().route("/whoami", get(whoami));
        if config.admin.enabled {
            protected = protected.merge(setup_admin_router(&config.admin, state.clone()));
        }
        let protected = protected
            .route_layer(middleware::from_fn_with_state(policy, enforce_policy))
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&state.gateway),
                authenticate_request,
            ))
            .route_layer(middleware::from_fn_with_state(certificate, attach_certificate));

        Router::new()
            .route("/healthz", get(healthz))
            .with_state(state.clone())
            .merge(protected)
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections.max(1)))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(middleware::from_fn_with_state(state, observe))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `signal` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Record metrics for every request and audit every access decision.
async fn observe(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let target_host = header(request.headers(), HOST.as_str())
        .or_else(|| request.uri().host().map(str::to_string))
        .unwrap_or_default();
    let user_agent = header(request.headers(), USER_AGENT.as_str());
    let request_id = header(request.headers(), X_REQUEST_ID);

    let response = next.run(request).await;
    let status = response.status().as_u16();
    state
        .metrics
        .observe_request(&route, &method, status, started.elapsed());

    let bytes_sent = response.body().size_hint().exact();
    match response.extensions().get::<AccessOutcome>() {
        Some(outcome) => {
            let reason = match outcome {
                AccessOutcome::Allowed(_) => None,
                AccessOutcome::Denied { error, .. } => {
                    state.metrics.record_auth_denied(error.code());
                    Some(error.code().to_string())
                }
            };
            state.audit.log_http(
                outcome.identity(),
                &source_ip,
                &target_host,
                outcome.is_allowed(),
                HttpDetails {
                    method,
                    path,
                    status_code: status,
                    bytes_sent,
                    user_agent,
                    request_id,
                    reason,
                },
            );
        }
        // The timeout dropped the handler before any decision was recorded.
        None if response.status() == StatusCode::REQUEST_TIMEOUT => {
            tracing::warn!(path = %path, source_ip = %source_ip, "Request timed out");
            state.audit.log_http(
                None,
                &source_ip,
                &target_host,
                false,
                HttpDetails {
                    method,
                    path,
                    status_code: status,
                    bytes_sent,
                    user_agent,
                    request_id,
                    reason: Some(REQUEST_TIMEOUT_REASON.to_string()),
                },
            );
        }
        None => {}
    }

    response
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.sync.current() {
        Some(cached) => Json(json!({
            "status": "ok",
            "config_version": cached.snapshot.version,
            "stale": cached.is_stale(state.sync.stale_after()),
        }))
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        )
            .into_response(),
    }
}

async fn whoami(
    Extension(identity): Extension<Identity>,
    Extension(certificate): Extension<CertificateFact>,
) -> Json<serde_json::Value> {
    let mut permissions: Vec<&String> = identity.permissions.iter().collect();
    permissions.sort();

    Json(json!({
        "user_id": identity.user_id,
        "username": identity.username,
        "permissions": permissions,
        "certificate": certificate,
    }))
}
