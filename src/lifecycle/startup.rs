//! Startup orchestration.
//!
//! Fail fast: the initial snapshot fetch and every bind are fatal. Background
//! tasks start before the listener so traffic only arrives once the gateway
//! has a provider.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::audit::{AuditError, AuditPipeline};
use crate::auth::{AuthorizationGateway, ValidatorError};
use crate::config::{ConfigSynchronizer, EnvOverrides, GatewayConfig, SyncError};
use crate::http::{AppState, GatewayServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics::metrics_router;
use crate::observability::MetricsRecorder;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build metrics registry: {0}")]
    Metrics(#[from] BuildError),

    #[error("initial configuration unavailable: {0}")]
    Config(#[from] SyncError),

    #[error("failed to build token validator: {0}")]
    Validator(#[from] ValidatorError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Run the gateway until SIGTERM or Ctrl+C.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    run_until(config, signals::wait_for_shutdown()).await
}

/// Run the gateway until `signal` resolves.
pub async fn run_until<F>(config: GatewayConfig, signal: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics = MetricsRecorder::new()?;

    let overrides = EnvOverrides::from_env();
    if !overrides.is_empty() {
        tracing::info!(?overrides, "Environment overrides present");
    }
    let sync = Arc::new(ConfigSynchronizer::new(
        &config.control_plane,
        overrides,
        metrics.clone(),
    )?);
    let snapshot = sync.fetch().await?;

    let gateway = Arc::new(AuthorizationGateway::new());
    gateway.configure(&snapshot)?;

    let audit = AuditPipeline::start(&config.audit, metrics.clone()).await?;

    let shutdown = Shutdown::new();
    let refresh = Duration::from_secs(config.control_plane.refresh_interval_secs.max(1));
    let mut tasks = vec![
        sync.watch(refresh, shutdown.subscribe()),
        gateway.follow(sync.subscribe(), shutdown.subscribe()),
        signals::reload_on_hangup(Arc::clone(&sync), shutdown.subscribe()),
    ];

    if config.observability.metrics_enabled {
        let listener = bind(&config.observability.metrics_address).await?;
        let router = metrics_router(metrics.clone());
        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Metrics listener failed");
            }
        }));
    }

    let listener = bind(&config.listener.bind_address).await?;
    let state = AppState {
        gateway,
        sync,
        audit: audit.clone(),
        metrics,
    };
    let served = GatewayServer::new(&config, state).run(listener, signal).await;

    shutdown.trigger();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }
    audit.shutdown().await;

    tracing::info!("Shutdown complete");
    served.map_err(StartupError::Serve)
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })?;
    if let Ok(local) = listener.local_addr() {
        tracing::info!(address = %local, "Listening");
    }
    Ok(listener)
}
