//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use edge_gateway::config::ControlPlaneConfig;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::{TcpListener, UdpSocket};

pub const JWT_SECRET: &str = "integration-secret";
pub const CLUSTER_ID: &str = "edge-test";
pub const CLUSTER_TOKEN: &str = "cluster-token-1";

/// A mock HTTP endpoint and what it has seen.
pub struct MockServer {
    pub url: String,
    pub calls: Arc<AtomicUsize>,
    pub last_authorization: Arc<Mutex<Option<String>>>,
}

impl MockServer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Control plane answering each fetch with the next scripted `(status, body)`.
/// The last entry repeats once the script runs out.
pub async fn start_control_plane(script: Vec<(u16, String)>) -> MockServer {
    let calls = Arc::new(AtomicUsize::new(0));
    let last_authorization = Arc::new(Mutex::new(None));
    let script = Arc::new(script);

    let handler = {
        let calls = Arc::clone(&calls);
        let seen = Arc::clone(&last_authorization);
        move |headers: HeaderMap| {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            let script = Arc::clone(&script);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                *seen.lock().unwrap() = headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                let (status, body) = script
                    .get(n)
                    .or(script.last())
                    .cloned()
                    .unwrap_or((404, String::new()));
                (
                    StatusCode::from_u16(status).unwrap(),
                    [(CONTENT_TYPE, "application/json")],
                    body,
                )
            }
        }
    };

    let app = Router::new().route("/api/v1/clusters/{cluster}/config", get(handler));
    let addr = serve(app).await;

    MockServer {
        url: format!("http://{addr}"),
        calls,
        last_authorization,
    }
}

/// RFC 7662 introspection endpoint. Known tokens map to their permission list.
pub async fn start_introspection(tokens: Vec<(&'static str, Vec<&'static str>)>) -> MockServer {
    start_introspection_with_delay(tokens, Duration::ZERO).await
}

/// Introspection endpoint that sleeps for `delay` before answering.
pub async fn start_introspection_with_delay(
    tokens: Vec<(&'static str, Vec<&'static str>)>,
    delay: Duration,
) -> MockServer {
    let calls = Arc::new(AtomicUsize::new(0));
    let last_authorization = Arc::new(Mutex::new(None));
    let tokens: Arc<HashMap<&'static str, Vec<&'static str>>> = Arc::new(tokens.into_iter().collect());

    let handler = {
        let calls = Arc::clone(&calls);
        let seen = Arc::clone(&last_authorization);
        move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            let tokens = Arc::clone(&tokens);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                *seen.lock().unwrap() = headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                let token = form.get("token").map(String::as_str).unwrap_or_default();
                match tokens.get(token) {
                    Some(permissions) => Json(json!({
                        "active": true,
                        "sub": format!("user-{token}"),
                        "username": format!("User {token}"),
                        "permissions": permissions,
                    })),
                    None => Json(json!({ "active": false })),
                }
            }
        }
    };

    let app = Router::new().route("/introspect", post(handler));
    let addr = serve(app).await;

    MockServer {
        url: format!("http://{addr}/introspect"),
        calls,
        last_authorization,
    }
}

/// A UDP socket standing in for the audit collector.
pub async fn start_collector() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

/// Receive one datagram or fail after two seconds.
pub async fn recv_datagram(socket: &UdpSocket) -> String {
    let mut buf = vec![0u8; 65536];
    let n = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf))
        .await
        .expect("datagram within timeout")
        .unwrap();
    String::from_utf8(buf[..n].to_vec()).unwrap()
}

pub fn control_plane_config(url: &str) -> ControlPlaneConfig {
    ControlPlaneConfig {
        url: url.to_string(),
        cluster_id: CLUSTER_ID.to_string(),
        cluster_token: CLUSTER_TOKEN.to_string(),
        timeout_secs: 2,
        ..Default::default()
    }
}

/// A snapshot document the validator accepts, with the given auth section.
pub fn snapshot_json(version: &str, auth: Value) -> String {
    json!({
        "version": version,
        "server": { "http_port": "8080", "tcp_port": "9000", "udp_port": "9001" },
        "tls": { "cert_file": "/etc/gw/tls.crt", "key_file": "/etc/gw/tls.key", "ca_file": "/etc/gw/ca.crt" },
        "auth": auth,
        "tunnel": {
            "interface_name": "wg0",
            "listen_port": 51820,
            "address": "10.8.0.1/24",
            "peers": [{ "public_key": "peer-key", "allowed_ips": ["10.8.0.2/32"] }]
        },
        "mirroring": { "enabled": false },
        "proxy": { "timeout_secs": 5 }
    })
    .to_string()
}

pub fn jwt_auth() -> Value {
    json!({
        "type": "jwt",
        "jwt": { "manager_url": "http://127.0.0.1:1", "secret": JWT_SECRET, "leeway_secs": 0 }
    })
}

pub fn oauth2_auth(introspection_url: &str) -> Value {
    json!({
        "type": "oauth2",
        "oauth2": {
            "introspection_url": introspection_url,
            "client_id": "gateway",
            "client_secret": "gateway-secret"
        }
    })
}

/// HS256 token for `sub` holding `permissions`, valid for an hour.
pub fn mint_jwt(sub: &str, permissions: &[&str]) -> String {
    let claims = json!({
        "sub": sub,
        "name": format!("Name of {sub}"),
        "exp": chrono::Utc::now().timestamp() + 3600,
        "permissions": permissions,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
