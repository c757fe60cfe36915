//! Zero-trust edge gateway library.

pub mod admin;
pub mod audit;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use audit::AuditPipeline;
pub use auth::AuthorizationGateway;
pub use config::{ConfigSynchronizer, GatewayConfig};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use observability::MetricsRecorder;
