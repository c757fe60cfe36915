//! Bootstrap configuration schema.
//!
//! This is the local file the gateway reads at startup. It only tells the
//! gateway where to listen, how to reach the control plane and where to ship
//! audit records; the operating configuration itself arrives as a
//! [`ConfigSnapshot`](crate::config::ConfigSnapshot).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Root bootstrap configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Control-plane connection settings.
    pub control_plane: ControlPlaneConfig,

    /// Access audit shipping.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Per-path permission requirements.
    pub access: AccessConfig,

    /// Where the TLS terminator reports the client certificate.
    pub certificate: CertificateConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests.
    pub max_connections: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            max_connections: 10_000,
            request_timeout_secs: 30,
        }
    }
}

/// Control-plane connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Base URL of the control plane (e.g., "https://manager.internal:9000").
    pub url: String,

    /// Cluster identifier the snapshot is keyed by.
    pub cluster_id: String,

    /// Pre-shared cluster credential, sent as a bearer token.
    pub cluster_token: String,

    /// Interval between background refreshes in seconds.
    pub refresh_interval_secs: u64,

    /// Age after which a cached snapshot is considered stale, in seconds.
    pub stale_after_secs: u64,

    /// Per-request timeout for snapshot fetches in seconds.
    pub timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            cluster_id: String::new(),
            cluster_token: String::new(),
            refresh_interval_secs: 30,
            stale_after_secs: 300,
            timeout_secs: 10,
        }
    }
}

/// Access audit shipping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable audit shipping. A disabled pipeline swallows entries.
    pub enabled: bool,

    /// Collector address (e.g., "10.0.0.5:514").
    pub collector_address: String,

    /// Application name written into every frame.
    pub app_name: String,

    /// Hostname written into every frame. Falls back to `$HOSTNAME`.
    pub hostname: Option<String>,

    /// Number of sender workers.
    pub workers: usize,

    /// Bounded queue capacity.
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            collector_address: String::new(),
            app_name: "edge-gateway".to_string(),
            hostname: None,
            workers: 3,
            queue_capacity: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "text" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// Permission a caller needs to reach the admin routes.
    pub permission: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permission: "admin".to_string(),
        }
    }
}

/// Path based permission rules.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    pub rules: Vec<AccessRule>,
}

/// Every request whose path starts with `path_prefix` needs all `permissions`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessRule {
    pub path_prefix: String,

    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Header names the TLS terminator uses to forward the client certificate.
///
/// With `trusted_peers` empty the headers are read from every connection, so
/// the terminator must strip or overwrite them on each request it forwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Carries the verification result ("SUCCESS", "NONE", "FAILED:<reason>").
    pub verify_header: String,

    /// Carries the certificate subject DN.
    pub subject_header: String,

    /// Peer addresses allowed to assert certificate headers.
    pub trusted_peers: Vec<IpAddr>,
}

impl CertificateConfig {
    /// Whether certificate headers from `peer` may be believed.
    pub fn trusts(&self, peer: Option<IpAddr>) -> bool {
        if self.trusted_peers.is_empty() {
            return true;
        }
        peer.is_some_and(|ip| self.trusted_peers.contains(&ip))
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            verify_header: "x-client-cert-verified".to_string(),
            subject_header: "x-client-cert-subject".to_string(),
            trusted_peers: Vec::new(),
        }
    }
}
