//! Access audit pipeline.
//!
//! # Data Flow
//! ```text
//! request path ──log()──▶ bounded queue ──▶ workers (N) ──UDP──▶ collector
//!                  │
//!                  └── full: drop + count
//! ```

pub mod entry;
pub mod frame;
pub mod pipeline;
mod worker;

pub use entry::{AccessLogEntry, Action, Protocol};
pub use pipeline::{AuditError, AuditPipeline, HttpDetails};
