//! Client certificate fact.
//!
//! The TLS handshake happens in front of the gateway. Whatever terminated it
//! either inserts a [`CertificateFact`] extension directly or forwards the
//! result in headers. Headers are only believed from `trusted_peers` when that
//! list is set. The fact is metadata only; it never grants or denies.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::config::CertificateConfig;

/// What the transport layer observed about the client certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertificateFact {
    pub present: bool,
    pub verified: bool,
    pub subject: Option<String>,
}

impl CertificateFact {
    /// Read the fact from forwarded headers.
    pub fn from_headers(headers: &HeaderMap, config: &CertificateConfig) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let verify = header(&config.verify_header);
        let subject = header(&config.subject_header).map(str::to_string);

        let verified = verify.is_some_and(|v| v.eq_ignore_ascii_case("SUCCESS"));
        let presented = verify.is_some_and(|v| !v.eq_ignore_ascii_case("NONE"));

        Self {
            present: presented || subject.is_some(),
            verified,
            subject,
        }
    }

    /// Read the fact from headers sent by `peer`, or report no certificate
    /// when that peer may not assert one.
    pub fn from_peer(headers: &HeaderMap, peer: Option<IpAddr>, config: &CertificateConfig) -> Self {
        if !config.trusts(peer) {
            if headers.contains_key(config.verify_header.as_str())
                || headers.contains_key(config.subject_header.as_str())
            {
                tracing::warn!(peer = ?peer, "Ignoring certificate headers from untrusted peer");
            }
            return Self::default();
        }
        Self::from_headers(headers, config)
    }
}

/// Attach the certificate fact before anything else looks at the request.
pub async fn attach_certificate(
    State(config): State<Arc<CertificateConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if request.extensions().get::<CertificateFact>().is_none() {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let fact = CertificateFact::from_peer(request.headers(), peer, &config);
        tracing::debug!(
            present = fact.present,
            verified = fact.verified,
            subject = ?fact.subject,
            "Client certificate observed"
        );
        request.extensions_mut().insert(fact);
    }
    next.run(request).await
}
