//! Authorization gateway subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → certificate.rs (record transport certificate fact)
//!     → gateway.rs (Bearer header → TokenValidator → Identity)
//!     → policy.rs (path rules → require_permissions)
//!     → protected handler
//!
//! TokenValidator (validator.rs) variants:
//!     jwt.rs | oauth2.rs | saml2.rs
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure
//! - Certificate fact is observed, never decisive
//! - Every response that went through the gateway carries an AccessOutcome

pub mod certificate;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod jwt;
pub mod oauth2;
pub mod policy;
pub mod saml2;
pub mod validator;

pub use certificate::CertificateFact;
pub use error::AuthError;
pub use gateway::{authenticate_request, bearer_token, enforce_permissions, require_permissions, AuthorizationGateway};
pub use identity::Identity;
pub use policy::AccessPolicy;
pub use validator::{TokenValidator, ValidatorError};

/// The gateway's decision, attached to the response for audit and metrics.
#[derive(Debug, Clone)]
pub enum AccessOutcome {
    Allowed(Identity),
    Denied {
        error: AuthError,
        identity: Option<Identity>,
    },
}

impl AccessOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AccessOutcome::Allowed(identity) => Some(identity),
            AccessOutcome::Denied { identity, .. } => identity.as_ref(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessOutcome::Allowed(_))
    }
}
