//! Configuration validation.
//!
//! # Responsibilities
//! - Reject snapshots missing fields the gateway cannot run without
//! - Check provider sub-objects match the selected auth type
//! - Validate bootstrap addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the parsed value
//! - Runs before a config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::snapshot::{AuthProvider, ConfigSnapshot};

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.http_port is required")]
    MissingHttpPort,

    #[error("auth.type is required")]
    MissingAuthType,

    #[error("auth.type '{0}' is not one of jwt, oauth2, saml2")]
    UnknownAuthType(String),

    #[error("auth.jwt.manager_url is required for jwt auth")]
    MissingJwtManagerUrl,

    #[error("auth.oauth2.introspection_url is required for oauth2 auth")]
    MissingIntrospectionUrl,

    #[error("auth.saml2.session_url is required for saml2 auth")]
    MissingSamlSessionUrl,

    #[error("tunnel.interface_name is required")]
    MissingTunnelInterface,

    #[error("tunnel.listen_port must be non-zero")]
    ZeroTunnelPort,

    #[error("mirroring.sample_rate must be within 0.0..=1.0")]
    InvalidSampleRate,

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validate a control-plane snapshot after env overrides were applied.
pub fn validate_snapshot(snapshot: &ConfigSnapshot) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if snapshot.server.http_port.trim().is_empty() {
        errors.push(ValidationError::MissingHttpPort);
    }

    let auth = &snapshot.auth;
    if auth.kind.trim().is_empty() {
        errors.push(ValidationError::MissingAuthType);
    } else {
        match auth.provider() {
            Some(AuthProvider::Jwt) => {
                let has_manager = auth
                    .jwt
                    .as_ref()
                    .is_some_and(|jwt| !jwt.manager_url.trim().is_empty());
                if !has_manager {
                    errors.push(ValidationError::MissingJwtManagerUrl);
                }
            }
            Some(AuthProvider::OAuth2) => {
                let has_endpoint = auth
                    .oauth2
                    .as_ref()
                    .is_some_and(|o| !o.introspection_url.trim().is_empty());
                if !has_endpoint {
                    errors.push(ValidationError::MissingIntrospectionUrl);
                }
            }
            Some(AuthProvider::Saml2) => {
                let has_endpoint = auth
                    .saml2
                    .as_ref()
                    .is_some_and(|s| !s.session_url.trim().is_empty());
                if !has_endpoint {
                    errors.push(ValidationError::MissingSamlSessionUrl);
                }
            }
            None => errors.push(ValidationError::UnknownAuthType(auth.kind.clone())),
        }
    }

    if snapshot.tunnel.interface_name.trim().is_empty() {
        errors.push(ValidationError::MissingTunnelInterface);
    }
    if snapshot.tunnel.listen_port == 0 {
        errors.push(ValidationError::ZeroTunnelPort);
    }

    let rate = snapshot.mirroring.sample_rate;
    if snapshot.mirroring.enabled && !(0.0..=1.0).contains(&rate) {
        errors.push(ValidationError::InvalidSampleRate);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the bootstrap file.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("listener.request_timeout_secs"));
    }

    let cp = &config.control_plane;
    if cp.url.trim().is_empty() {
        errors.push(ValidationError::Missing("control_plane.url"));
    }
    if cp.cluster_id.trim().is_empty() {
        errors.push(ValidationError::Missing("control_plane.cluster_id"));
    }
    if cp.refresh_interval_secs == 0 {
        errors.push(ValidationError::Zero("control_plane.refresh_interval_secs"));
    }
    if cp.timeout_secs == 0 {
        errors.push(ValidationError::Zero("control_plane.timeout_secs"));
    }

    if config.admin.enabled && config.admin.permission.trim().is_empty() {
        errors.push(ValidationError::Missing("admin.permission"));
    }

    if config.audit.enabled {
        check_address(&mut errors, "audit.collector_address", &config.audit.collector_address);
        if config.audit.workers == 0 {
            errors.push(ValidationError::Zero("audit.workers"));
        }
        if config.audit.queue_capacity == 0 {
            errors.push(ValidationError::Zero("audit.queue_capacity"));
        }
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::snapshot::{JwtConfig, OAuth2Config};

    fn valid_snapshot() -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.server.http_port = "8080".into();
        snapshot.auth.kind = "jwt".into();
        snapshot.auth.jwt = Some(JwtConfig {
            manager_url: "https://manager.internal".into(),
            issuer: None,
            audience: None,
            secret: None,
            leeway_secs: 60,
            jwks_ttl_secs: 3600,
            jwks_refresh_cooldown_secs: 30,
        });
        snapshot.tunnel.interface_name = "wg0".into();
        snapshot.tunnel.listen_port = 51820;
        snapshot
    }

    #[test]
    fn test_valid_snapshot_passes() {
        assert!(validate_snapshot(&valid_snapshot()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let errors = validate_snapshot(&ConfigSnapshot::default()).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingHttpPort,
                ValidationError::MissingAuthType,
                ValidationError::MissingTunnelInterface,
                ValidationError::ZeroTunnelPort,
            ]
        );
    }

    #[test]
    fn test_jwt_requires_manager_url() {
        let mut snapshot = valid_snapshot();
        snapshot.auth.jwt.as_mut().unwrap().manager_url.clear();
        assert_eq!(
            validate_snapshot(&snapshot).unwrap_err(),
            vec![ValidationError::MissingJwtManagerUrl]
        );

        snapshot.auth.jwt = None;
        assert_eq!(
            validate_snapshot(&snapshot).unwrap_err(),
            vec![ValidationError::MissingJwtManagerUrl]
        );
    }

    #[test]
    fn test_unknown_auth_type() {
        let mut snapshot = valid_snapshot();
        snapshot.auth.kind = "ldap".into();
        assert_eq!(
            validate_snapshot(&snapshot).unwrap_err(),
            vec![ValidationError::UnknownAuthType("ldap".into())]
        );
    }

    #[test]
    fn test_oauth2_requires_introspection_url() {
        let mut snapshot = valid_snapshot();
        snapshot.auth.kind = "oauth2".into();
        snapshot.auth.oauth2 = Some(OAuth2Config::default());
        assert_eq!(
            validate_snapshot(&snapshot).unwrap_err(),
            vec![ValidationError::MissingIntrospectionUrl]
        );
    }

    #[test]
    fn test_sample_rate_only_checked_when_mirroring() {
        let mut snapshot = valid_snapshot();
        snapshot.mirroring.sample_rate = 2.0;
        assert!(validate_snapshot(&snapshot).is_ok());

        snapshot.mirroring.enabled = true;
        assert_eq!(
            validate_snapshot(&snapshot).unwrap_err(),
            vec![ValidationError::InvalidSampleRate]
        );
    }

    #[test]
    fn test_bootstrap_requires_control_plane() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        assert!(errors.contains(&ValidationError::Missing("control_plane.url")));
        assert!(errors.contains(&ValidationError::Missing("control_plane.cluster_id")));
    }

    #[test]
    fn test_bootstrap_audit_address_checked_when_enabled() {
        let mut config = GatewayConfig::default();
        config.control_plane.url = "http://127.0.0.1:9000".into();
        config.control_plane.cluster_id = "edge-1".into();
        assert!(validate_config(&config).is_ok());

        config.audit.enabled = true;
        config.audit.collector_address = "collector".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidAddress {
                field: "audit.collector_address",
                value: "collector".into(),
            }]
        );
    }

    #[test]
    fn test_bootstrap_rejects_zero_fetch_timeout_and_blank_admin_permission() {
        let mut config = GatewayConfig::default();
        config.control_plane.url = "http://127.0.0.1:9000".into();
        config.control_plane.cluster_id = "edge-1".into();
        config.control_plane.timeout_secs = 0;
        config.admin.permission = "  ".into();

        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![
                ValidationError::Zero("control_plane.timeout_secs"),
                ValidationError::Missing("admin.permission"),
            ]
        );

        config.control_plane.timeout_secs = 5;
        config.admin.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
