//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     metrics → initial snapshot fetch → token validator → audit workers
//!         → config watcher → listeners
//!
//! Shutdown (shutdown.rs):
//!     signal → stop server → stop watcher → stop audit workers → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//!     SIGHUP → forced configuration refresh
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, run_until, StartupError};
