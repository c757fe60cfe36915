//! Authentication and authorization failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::AccessOutcome;

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    Missing,

    #[error("Authorization header must be of the form 'Bearer <token>'")]
    Malformed,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("missing required permission(s): {}", .missing.join(", "))]
    PermissionDenied { missing: Vec<String> },

    #[error("request is not authenticated")]
    Unauthenticated,

    #[error("no authentication provider is configured")]
    Unavailable,
}

impl AuthError {
    /// Stable machine-readable reason, also used as a metric label.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Missing => "auth_missing",
            AuthError::Malformed => "auth_malformed",
            AuthError::Invalid(_) => "auth_invalid",
            AuthError::PermissionDenied { .. } => "permission_denied",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Unavailable => "auth_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            AuthError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        let mut response = (self.status(), Json(body)).into_response();
        response.extensions_mut().insert(AccessOutcome::Denied {
            error: self,
            identity: None,
        });
        response
    }
}
