//! Zero-trust edge gateway.
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!   client ──HTTP──▶  │ observe → certificate → bearer auth → policy │ ──▶ handler
//!                     └───────┬─────────────────────────┬────────────┘
//!                             │ audit entry             │ metrics
//!                             ▼                         ▼
//!                     UDP collector (N workers)   /metrics listener
//!
//!   control plane ──(poll)──▶ ConfigSynchronizer ──watch──▶ token validator
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_gateway::config::loader::load_config;
use edge_gateway::lifecycle;
use edge_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "edge-gateway", version, about = "Zero-trust access gateway")]
struct Args {
    /// Bootstrap configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        cluster_id = %config.control_plane.cluster_id,
        "edge-gateway starting"
    );

    if let Err(e) = lifecycle::run(config).await {
        tracing::error!(error = %e, "Gateway exited with error");
        return Err(e.into());
    }
    Ok(())
}
