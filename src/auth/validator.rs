//! Token validator selection.
//!
//! The provider is chosen from the snapshot's `auth.type` when the snapshot
//! is loaded. The gateway only ever calls [`TokenValidator::validate`], so a
//! new provider is a new variant here and nothing else.

use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::identity::Identity;
use crate::auth::jwt::JwtValidator;
use crate::auth::oauth2::OAuth2Validator;
use crate::auth::saml2::Saml2Validator;
use crate::config::snapshot::{AuthConfig, AuthProvider};

/// Why a provider refused a token.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("{0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token header has no key id")]
    MissingKeyId,

    #[error("unknown signing key '{0}'")]
    UnknownKey(String),

    #[error("token is not active")]
    Inactive,

    #[error("identity provider rejected the token (HTTP {0})")]
    Rejected(StatusCode),

    #[error("token carries no subject")]
    MissingSubject,

    #[error("{0}")]
    Unsupported(String),

    #[error("auth type '{0}' has no provider settings")]
    MissingSettings(&'static str),
}

/// Bearer token validation, one variant per provider type.
pub enum TokenValidator {
    Jwt(JwtValidator),
    OAuth2(OAuth2Validator),
    Saml2(Saml2Validator),
}

impl TokenValidator {
    /// Build the validator the auth settings select.
    pub fn from_config(auth: &AuthConfig, client: reqwest::Client) -> Result<Self, ValidatorError> {
        match auth.provider() {
            Some(AuthProvider::Jwt) => auth
                .jwt
                .as_ref()
                .map(|config| Self::Jwt(JwtValidator::new(config, client)))
                .ok_or(ValidatorError::MissingSettings("jwt")),
            Some(AuthProvider::OAuth2) => auth
                .oauth2
                .as_ref()
                .map(|config| Self::OAuth2(OAuth2Validator::new(config.clone(), client)))
                .ok_or(ValidatorError::MissingSettings("oauth2")),
            Some(AuthProvider::Saml2) => auth
                .saml2
                .as_ref()
                .map(|config| Self::Saml2(Saml2Validator::new(config.clone(), client)))
                .ok_or(ValidatorError::MissingSettings("saml2")),
            None => Err(ValidatorError::Unsupported(format!(
                "unknown auth type '{}'",
                auth.kind
            ))),
        }
    }

    pub fn provider(&self) -> AuthProvider {
        match self {
            Self::Jwt(_) => AuthProvider::Jwt,
            Self::OAuth2(_) => AuthProvider::OAuth2,
            Self::Saml2(_) => AuthProvider::Saml2,
        }
    }

    /// Validate a bearer token and resolve the caller.
    ///
    /// May call out to the identity provider.
    pub async fn validate(&self, token: &str) -> Result<Identity, ValidatorError> {
        match self {
            Self::Jwt(v) => v.validate(token).await,
            Self::OAuth2(v) => v.validate(token).await,
            Self::Saml2(v) => v.validate(token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::snapshot::JwtConfig;

    #[test]
    fn test_selects_variant_by_type() {
        let mut auth = AuthConfig {
            kind: "jwt".into(),
            jwt: Some(JwtConfig {
                manager_url: "https://manager.internal".into(),
                issuer: None,
                audience: None,
                secret: Some("secret".into()),
                leeway_secs: 0,
                jwks_ttl_secs: 3600,
                jwks_refresh_cooldown_secs: 30,
            }),
            ..Default::default()
        };
        let validator = TokenValidator::from_config(&auth, reqwest::Client::new()).unwrap();
        assert_eq!(validator.provider(), AuthProvider::Jwt);

        auth.kind = "saml2".into();
        assert!(matches!(
            TokenValidator::from_config(&auth, reqwest::Client::new()),
            Err(ValidatorError::MissingSettings("saml2"))
        ));

        auth.kind = "kerberos".into();
        assert!(matches!(
            TokenValidator::from_config(&auth, reqwest::Client::new()),
            Err(ValidatorError::Unsupported(_))
        ));
    }
}
