//! OAuth2 token introspection (RFC 7662).

use serde::Deserialize;

use crate::auth::identity::Identity;
use crate::auth::validator::ValidatorError;
use crate::config::snapshot::OAuth2Config;

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    permissions: Option<Vec<String>>,
}

/// Asks the authorization server whether a token is active.
pub struct OAuth2Validator {
    config: OAuth2Config,
    client: reqwest::Client,
}

impl OAuth2Validator {
    pub fn new(config: OAuth2Config, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub async fn validate(&self, token: &str) -> Result<Identity, ValidatorError> {
        let response = self
            .client
            .post(&self.config.introspection_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("token", token), ("token_type_hint", "access_token")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidatorError::Rejected(status));
        }

        let body: IntrospectionResponse = response.json().await?;
        if !body.active {
            return Err(ValidatorError::Inactive);
        }

        let sub = body
            .sub
            .filter(|s| !s.is_empty())
            .ok_or(ValidatorError::MissingSubject)?;
        let username = body.username.unwrap_or_else(|| sub.clone());

        // `scope` is the standard field; a dedicated list wins when present.
        let permissions = match body.permissions {
            Some(list) => list,
            None => body
                .scope
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        };

        Ok(Identity::new(sub, username, permissions))
    }
}
