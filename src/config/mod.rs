//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs (parse & validate bootstrap settings)
//!
//! control plane (JSON, per cluster)
//!     → sync.rs (authenticated fetch)
//!     → overrides.rs (GATEWAY_* environment overrides)
//!     → validation.rs (required fields)
//!     → atomic swap of Arc<ConfigSnapshot>
//!     → watch channel notifies dependants (auth provider rebuild)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable once published; changes require a full refetch
//! - A rejected snapshot never replaces the current one
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod snapshot;
pub mod sync;
pub mod validation;

pub use overrides::EnvOverrides;
pub use schema::{
    AccessConfig, AccessRule, AdminConfig, AuditConfig, CertificateConfig, ControlPlaneConfig,
    GatewayConfig, ListenerConfig, ObservabilityConfig,
};
pub use snapshot::{AuthConfig, AuthProvider, ConfigSnapshot};
pub use sync::{CachedSnapshot, ConfigSynchronizer, SyncError};
pub use validation::ValidationError;
