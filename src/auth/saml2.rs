//! SAML2 session validation.
//!
//! After a SAML assertion is consumed, the service provider issues an opaque
//! session token. Validating it means asking the service provider which
//! identity the session belongs to.

use serde::Deserialize;

use crate::auth::identity::Identity;
use crate::auth::validator::ValidatorError;
use crate::config::snapshot::Saml2Config;

const ENTITY_HEADER: &str = "x-saml-entity-id";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    name_id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

pub struct Saml2Validator {
    config: Saml2Config,
    client: reqwest::Client,
}

impl Saml2Validator {
    pub fn new(config: Saml2Config, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub async fn validate(&self, token: &str) -> Result<Identity, ValidatorError> {
        let response = self
            .client
            .get(&self.config.session_url)
            .bearer_auth(token)
            .header(ENTITY_HEADER, &self.config.entity_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidatorError::Rejected(status));
        }

        let session: SessionResponse = response.json().await?;
        if session.name_id.is_empty() {
            return Err(ValidatorError::MissingSubject);
        }

        let username = session
            .display_name
            .unwrap_or_else(|| session.name_id.clone());
        Ok(Identity::new(session.name_id, username, session.permissions))
    }
}
