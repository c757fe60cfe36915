//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, observe)
//!     → auth (certificate → bearer token → permissions)
//!     → protected handler
//!     → observe (metrics + audit entry)
//! ```

pub mod server;

pub use server::{AppState, GatewayServer};
