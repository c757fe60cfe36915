//! Authorization gateway.
//!
//! # Request order
//! ```text
//! certificate fact (certificate.rs)
//!     → bearer token check + validation (this file)
//!     → permission check (require_permissions / policy.rs)
//!     → protected handler
//! ```
//!
//! A malformed or missing credential is rejected before the validator is
//! touched. The validator is swapped atomically when the control plane
//! changes the auth settings or the outbound timeout its client uses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Extensions, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::auth::error::AuthError;
use crate::auth::identity::Identity;
use crate::auth::validator::{TokenValidator, ValidatorError};
use crate::auth::AccessOutcome;
use crate::config::snapshot::{AuthConfig, AuthProvider, ConfigSnapshot};

const BEARER_PREFIX: &str = "Bearer ";

/// The parts of a snapshot a built validator depends on.
#[derive(Debug, Clone, PartialEq)]
struct ValidatorSettings {
    auth: AuthConfig,
    timeout_secs: u64,
}

impl ValidatorSettings {
    fn of(snapshot: &ConfigSnapshot) -> Self {
        Self {
            auth: snapshot.auth.clone(),
            timeout_secs: snapshot.proxy.timeout_secs,
        }
    }
}

/// Per-request dual-auth enforcement.
#[derive(Default)]
pub struct AuthorizationGateway {
    validator: ArcSwapOption<TokenValidator>,
}

impl AuthorizationGateway {
    /// A gateway with no provider yet; every token check fails with `Unavailable`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(validator: TokenValidator) -> Self {
        Self {
            validator: ArcSwapOption::from_pointee(validator),
        }
    }

    /// Build and install the validator a snapshot selects.
    ///
    /// On error the previous validator stays installed.
    pub fn configure(&self, snapshot: &ConfigSnapshot) -> Result<(), ValidatorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(snapshot.proxy.timeout_secs.max(1)))
            .build()?;
        let validator = TokenValidator::from_config(&snapshot.auth, client)?;

        tracing::info!(
            provider = validator.provider().as_str(),
            version = %snapshot.version,
            "Token validator configured"
        );
        self.validator.store(Some(Arc::new(validator)));
        Ok(())
    }

    pub fn provider(&self) -> Option<AuthProvider> {
        self.validator.load_full().map(|v| v.provider())
    }

    /// Rebuild the validator whenever a published snapshot changes the auth
    /// settings or the proxy timeout.
    pub fn follow(
        self: &Arc<Self>,
        mut updates: watch::Receiver<Option<Arc<ConfigSnapshot>>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let mut active = updates.borrow().as_deref().map(ValidatorSettings::of);

            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let Some(snapshot) = updates.borrow_and_update().clone() else {
                            continue;
                        };
                        let settings = ValidatorSettings::of(&snapshot);
                        if active.as_ref() == Some(&settings) {
                            continue;
                        }
                        match this.configure(&snapshot) {
                            Ok(()) => active = Some(settings),
                            Err(e) => tracing::error!(
                                error = %e,
                                version = %snapshot.version,
                                "Failed to rebuild token validator. Keeping current provider."
                            ),
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    /// Resolve the caller behind the request's credential header.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = bearer_token(headers)?;
        let validator = self.validator.load_full().ok_or(AuthError::Unavailable)?;
        validator
            .validate(token)
            .await
            .map_err(|e| AuthError::Invalid(e.to_string()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
    let value = value.to_str().map_err(|_| AuthError::Malformed)?;
    let token = value.strip_prefix(BEARER_PREFIX).ok_or(AuthError::Malformed)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::Malformed);
    }
    Ok(token)
}

/// Fail closed unless the bound identity holds every required permission.
pub fn require_permissions<'a>(
    extensions: &'a Extensions,
    required: &HashSet<String>,
) -> Result<&'a Identity, AuthError> {
    let identity = extensions
        .get::<Identity>()
        .ok_or(AuthError::Unauthenticated)?;

    let missing = identity.missing_permissions(required);
    if missing.is_empty() {
        Ok(identity)
    } else {
        Err(AuthError::PermissionDenied { missing })
    }
}

/// Denial response that remembers who was denied.
pub(crate) fn deny(error: AuthError, identity: Option<Identity>, path: &str) -> Response {
    tracing::warn!(
        reason = error.code(),
        path = %path,
        user_id = identity.as_ref().map(|i| i.user_id.as_str()).unwrap_or("-"),
        error = %error,
        "Access denied"
    );

    let outcome = AccessOutcome::Denied {
        error: error.clone(),
        identity,
    };
    let mut response = error.into_response();
    response.extensions_mut().insert(outcome);
    response
}

/// Middleware: authenticate the bearer token and bind the identity.
pub async fn authenticate_request(
    State(gateway): State<Arc<AuthorizationGateway>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let result = gateway.authenticate(request.headers()).await;
    match result {
        Ok(identity) => {
            tracing::debug!(user_id = %identity.user_id, "Request authenticated");
            request.extensions_mut().insert(identity.clone());

            let mut response = next.run(request).await;
            if response.extensions().get::<AccessOutcome>().is_none() {
                response
                    .extensions_mut()
                    .insert(AccessOutcome::Allowed(identity));
            }
            response
        }
        Err(error) => deny(error, None, request.uri().path()),
    }
}

/// Middleware: require a fixed permission set.
///
/// `middleware::from_fn_with_state(Arc::new(permissions), enforce_permissions)`
pub async fn enforce_permissions(
    State(required): State<Arc<HashSet<String>>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let check = require_permissions(request.extensions(), &required).map(|_| ());
    match check {
        Ok(()) => next.run(request).await,
        Err(error) => {
            let identity = request.extensions().get::<Identity>().cloned();
            deny(error, identity, request.uri().path())
        }
    }
}
