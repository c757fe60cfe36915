//! OS signal handling.
//!
//! SIGTERM and Ctrl+C stop the gateway. SIGHUP forces a configuration
//! refresh outside the regular interval.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::ConfigSynchronizer;

/// Resolve once the process is asked to stop.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}

/// Refetch the configuration on every SIGHUP until shutdown.
#[cfg(unix)]
pub fn reload_on_hangup(
    sync: Arc<ConfigSynchronizer>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP reload unavailable");
                let _ = shutdown.recv().await;
                return;
            }
        };

        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, refreshing configuration");
                    if let Err(e) = sync.fetch().await {
                        tracing::error!(error = %e, "Forced refresh failed. Keeping current configuration.");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

#[cfg(not(unix))]
pub fn reload_on_hangup(
    _sync: Arc<ConfigSynchronizer>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = shutdown.recv().await;
    })
}
