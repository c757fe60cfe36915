//! Admin API, served behind the gateway's own auth plus the admin permission.

pub mod handlers;

use std::collections::HashSet;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::handlers::*;
use crate::auth::enforce_permissions;
use crate::config::AdminConfig;
use crate::http::server::AppState;

pub fn setup_admin_router(config: &AdminConfig, state: AppState) -> Router {
    let required: HashSet<String> = [config.permission.clone()].into_iter().collect();

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/config", get(get_config))
        .route_layer(middleware::from_fn_with_state(Arc::new(required), enforce_permissions))
        .with_state(state)
}
