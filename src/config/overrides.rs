//! Environment overrides applied on top of every fetched snapshot.

use crate::config::snapshot::ConfigSnapshot;

pub const HTTP_PORT: &str = "GATEWAY_HTTP_PORT";
pub const TCP_PORT: &str = "GATEWAY_TCP_PORT";
pub const UDP_PORT: &str = "GATEWAY_UDP_PORT";
pub const AUTH_TYPE: &str = "GATEWAY_AUTH_TYPE";
pub const MIRRORING_ENABLED: &str = "GATEWAY_MIRRORING_ENABLED";

/// Override values captured once, so every refresh applies the same set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    http_port: Option<String>,
    tcp_port: Option<String>,
    udp_port: Option<String>,
    auth_type: Option<String>,
    mirroring_enabled: Option<bool>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build overrides from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        Self::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| lookup(key).filter(|v| !v.is_empty());

        // Anything other than the two literals is ignored.
        let mirroring_enabled = match value(MIRRORING_ENABLED).as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };

        Self {
            http_port: value(HTTP_PORT),
            tcp_port: value(TCP_PORT),
            udp_port: value(UDP_PORT),
            auth_type: value(AUTH_TYPE),
            mirroring_enabled,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply overrides in place. Returns the names of the keys that took effect.
    pub fn apply(&self, snapshot: &mut ConfigSnapshot) -> Vec<&'static str> {
        let mut applied = Vec::new();

        if let Some(port) = &self.http_port {
            snapshot.server.http_port = port.clone();
            applied.push(HTTP_PORT);
        }
        if let Some(port) = &self.tcp_port {
            snapshot.server.tcp_port = port.clone();
            applied.push(TCP_PORT);
        }
        if let Some(port) = &self.udp_port {
            snapshot.server.udp_port = port.clone();
            applied.push(UDP_PORT);
        }
        if let Some(kind) = &self.auth_type {
            snapshot.auth.kind = kind.clone();
            applied.push(AUTH_TYPE);
        }
        if let Some(enabled) = self.mirroring_enabled {
            snapshot.mirroring.enabled = enabled;
            applied.push(MIRRORING_ENABLED);
        }

        applied
    }
}
