//! Control-plane configuration snapshot.
//!
//! A snapshot is parsed from the JSON document the control plane serves for
//! a cluster. Once validated it is never mutated: the synchronizer replaces
//! it wholesale and every reader holds an `Arc<ConfigSnapshot>`.

use serde::{Deserialize, Serialize};

const REDACTED: &str = "***";

/// Versioned operating configuration issued by the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ConfigSnapshot {
    /// Version stamp assigned by the control plane.
    pub version: String,

    /// Listen ports.
    pub server: ServerConfig,

    /// TLS material references.
    pub tls: TlsConfig,

    /// Authentication provider settings.
    pub auth: AuthConfig,

    /// Tunnel interface and peers.
    pub tunnel: TunnelConfig,

    /// Traffic mirroring.
    pub mirroring: MirroringConfig,

    /// Reverse-proxy behaviour.
    pub proxy: ProxyBehaviorConfig,
}

/// Listen ports. Ports are strings because the control plane may leave them empty.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub http_port: String,
    pub tcp_port: String,
    pub udp_port: String,
}

/// TLS material paths.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_file: String,
    pub key_file: String,
    pub ca_file: String,
}

/// Supported authentication providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    Jwt,
    OAuth2,
    Saml2,
}

impl AuthProvider {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "jwt" => Some(Self::Jwt),
            "oauth2" => Some(Self::OAuth2),
            "saml2" => Some(Self::Saml2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jwt => "jwt",
            Self::OAuth2 => "oauth2",
            Self::Saml2 => "saml2",
        }
    }
}

/// Authentication settings: a type discriminator plus provider sub-objects.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2Config>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml2: Option<Saml2Config>,
}

impl AuthConfig {
    /// The selected provider, if `type` names a known one.
    pub fn provider(&self) -> Option<AuthProvider> {
        AuthProvider::parse(&self.kind)
    }
}

/// JWT provider settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JwtConfig {
    /// Identity manager base URL; the JWKS lives at `/.well-known/jwks.json`.
    #[serde(default)]
    pub manager_url: String,

    /// Expected `iss` claim.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected `aud` claim.
    #[serde(default)]
    pub audience: Option<String>,

    /// Shared HMAC secret. When set, the JWKS is not consulted.
    #[serde(default)]
    pub secret: Option<String>,

    /// Clock skew tolerance in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,

    /// How long a fetched JWKS is trusted before it is fetched again.
    #[serde(default = "default_jwks_ttl")]
    pub jwks_ttl_secs: u64,

    /// Minimum spacing between refreshes forced by an unknown `kid`.
    #[serde(default = "default_jwks_cooldown")]
    pub jwks_refresh_cooldown_secs: u64,
}

fn default_leeway() -> u64 {
    60
}

fn default_jwks_ttl() -> u64 {
    3600
}

fn default_jwks_cooldown() -> u64 {
    30
}

/// OAuth2 token introspection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct OAuth2Config {
    pub introspection_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// SAML2 service-provider session settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Saml2Config {
    /// Session lookup endpoint of the service provider.
    pub session_url: String,

    /// Entity ID of this service provider.
    pub entity_id: String,
}

/// Tunnel interface and peer list.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TunnelConfig {
    pub interface_name: String,
    pub listen_port: u16,
    pub address: String,
    pub peers: Vec<TunnelPeer>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TunnelPeer {
    pub public_key: String,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub allowed_ips: Vec<String>,

    #[serde(default)]
    pub persistent_keepalive_secs: Option<u16>,
}

/// Traffic mirroring settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MirroringConfig {
    pub enabled: bool,
    pub destinations: Vec<String>,
    pub protocol: String,
    pub buffer_size: usize,

    /// Fraction of traffic to mirror, 0.0 to 1.0.
    pub sample_rate: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<MirrorFilter>,
}

impl Default for MirroringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            destinations: Vec::new(),
            protocol: "udp".to_string(),
            buffer_size: 4096,
            sample_rate: 1.0,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct MirrorFilter {
    pub protocols: Vec<String>,
    pub ports: Vec<u16>,
    pub source_cidrs: Vec<String>,
}

/// Reverse-proxy behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProxyBehaviorConfig {
    /// Skip upstream TLS verification.
    pub insecure_skip_verify: bool,

    /// Upstream timeout in seconds. Also bounds identity-provider calls.
    pub timeout_secs: u64,

    pub max_idle_conns: usize,
}

impl Default for ProxyBehaviorConfig {
    fn default() -> Self {
        Self {
            insecure_skip_verify: false,
            timeout_secs: 30,
            max_idle_conns: 100,
        }
    }
}

impl ConfigSnapshot {
    /// Copy of the snapshot with provider secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(jwt) = copy.auth.jwt.as_mut() {
            if jwt.secret.is_some() {
                jwt.secret = Some(REDACTED.to_string());
            }
        }
        if let Some(oauth2) = copy.auth.oauth2.as_mut() {
            if !oauth2.client_secret.is_empty() {
                oauth2.client_secret = REDACTED.to_string();
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "version": "42",
        "server": { "http_port": "8080", "tcp_port": "9000", "udp_port": "" },
        "tls": { "cert_file": "/etc/gw/cert.pem", "key_file": "/etc/gw/key.pem", "ca_file": "/etc/gw/ca.pem" },
        "auth": {
            "type": "jwt",
            "jwt": { "manager_url": "https://manager.internal", "secret": "s3cret" }
        },
        "tunnel": {
            "interface_name": "wg0",
            "listen_port": 51820,
            "peers": [ { "public_key": "abc=", "allowed_ips": ["10.0.0.2/32"] } ]
        },
        "mirroring": {
            "enabled": true,
            "destinations": ["10.0.0.9:4789"],
            "protocol": "udp",
            "buffer_size": 8192,
            "sample_rate": 0.25,
            "filter": { "protocols": ["tcp"], "ports": [443] }
        },
        "proxy": { "insecure_skip_verify": false, "timeout_secs": 15, "max_idle_conns": 32 }
    }"#;

    #[test]
    fn test_parse_control_plane_document() {
        let snapshot: ConfigSnapshot = serde_json::from_str(DOCUMENT).unwrap();

        assert_eq!(snapshot.version, "42");
        assert_eq!(snapshot.server.http_port, "8080");
        assert_eq!(snapshot.auth.provider(), Some(AuthProvider::Jwt));
        let jwt = snapshot.auth.jwt.as_ref().unwrap();
        assert_eq!(jwt.manager_url, "https://manager.internal");
        assert_eq!(jwt.leeway_secs, 60);
        assert_eq!(snapshot.tunnel.peers.len(), 1);
        assert_eq!(snapshot.mirroring.sample_rate, 0.25);
        assert_eq!(snapshot.mirroring.filter.as_ref().unwrap().ports, vec![443]);
        assert_eq!(snapshot.proxy.max_idle_conns, 32);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let snapshot: ConfigSnapshot = serde_json::from_str(r#"{"version": "1"}"#).unwrap();
        assert!(snapshot.auth.kind.is_empty());
        assert!(!snapshot.mirroring.enabled);
        assert_eq!(snapshot.proxy.timeout_secs, 30);
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let snapshot: ConfigSnapshot = serde_json::from_str(DOCUMENT).unwrap();
        let redacted = snapshot.redacted();
        assert_eq!(redacted.auth.jwt.unwrap().secret.as_deref(), Some("***"));
        assert_eq!(snapshot.auth.jwt.unwrap().secret.as_deref(), Some("s3cret"));
    }
}
