//! Control-plane configuration synchronizer.
//!
//! # State
//! ```text
//! Uncached ──fetch ok──▶ Cached(fresh) ──time──▶ Cached(stale)
//!                              ▲                      │
//!                              └──fetch ok── Refreshing ◀┘
//!                                     (fetch err: stays Cached(stale))
//! ```
//!
//! The synchronizer is the only writer of the cached snapshot. Publication is
//! a single pointer swap, so readers never lock and never see a partial value.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

use crate::config::loader::join_errors;
use crate::config::overrides::EnvOverrides;
use crate::config::schema::ControlPlaneConfig;
use crate::config::snapshot::ConfigSnapshot;
use crate::config::validation::{validate_snapshot, ValidationError};
use crate::observability::MetricsRecorder;

/// Errors produced while synchronizing with the control plane.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure talking to the control plane.
    #[error("control plane request failed: {0}")]
    Fetch(#[source] reqwest::Error),

    /// The control plane answered with a non-success status.
    #[error("control plane returned HTTP {0}")]
    Status(StatusCode),

    /// The payload is not a valid snapshot document.
    #[error("malformed configuration payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// The snapshot parsed but misses required fields.
    #[error("configuration rejected: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// The bootstrap control-plane settings are unusable.
    #[error("invalid control plane url '{url}': {reason}")]
    Endpoint { url: String, reason: String },
}

impl SyncError {
    /// True for transport and HTTP failures.
    pub fn is_fetch(&self) -> bool {
        matches!(self, SyncError::Fetch(_) | SyncError::Status(_))
    }
}

/// A published snapshot together with when it was fetched.
#[derive(Debug)]
pub struct CachedSnapshot {
    pub snapshot: Arc<ConfigSnapshot>,
    pub fetched_at: DateTime<Utc>,
    loaded: Instant,
}

impl CachedSnapshot {
    fn new(snapshot: Arc<ConfigSnapshot>) -> Self {
        Self {
            snapshot,
            fetched_at: Utc::now(),
            loaded: Instant::now(),
        }
    }

    /// Time since the snapshot was fetched.
    pub fn age(&self) -> Duration {
        self.loaded.elapsed()
    }

    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.age() >= threshold
    }
}

/// Keeps the gateway's operating configuration in sync with the control plane.
pub struct ConfigSynchronizer {
    client: reqwest::Client,
    endpoint: Url,
    cluster_token: String,
    overrides: EnvOverrides,
    stale_after: Duration,
    cache: ArcSwapOption<CachedSnapshot>,
    updates: watch::Sender<Option<Arc<ConfigSnapshot>>>,
    metrics: MetricsRecorder,
}

impl ConfigSynchronizer {
    /// Create a synchronizer for the configured cluster. Nothing is fetched yet.
    pub fn new(
        config: &ControlPlaneConfig,
        overrides: EnvOverrides,
        metrics: MetricsRecorder,
    ) -> Result<Self, SyncError> {
        let endpoint = snapshot_endpoint(&config.url, &config.cluster_id)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SyncError::Fetch)?;
        let (updates, _) = watch::channel(None);

        Ok(Self {
            client,
            endpoint,
            cluster_token: config.cluster_token.clone(),
            overrides,
            stale_after: Duration::from_secs(config.stale_after_secs),
            cache: ArcSwapOption::empty(),
            updates,
            metrics,
        })
    }

    /// The URL snapshots are fetched from.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Fetch, validate and publish a new snapshot.
    ///
    /// On any error the previously cached snapshot stays in force.
    pub async fn fetch(&self) -> Result<Arc<ConfigSnapshot>, SyncError> {
        let result = self.fetch_and_publish().await;
        self.metrics.record_config_fetch(result.is_ok());
        result
    }

    async fn fetch_and_publish(&self) -> Result<Arc<ConfigSnapshot>, SyncError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(&self.cluster_token)
            .send()
            .await
            .map_err(SyncError::Fetch)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status));
        }

        let body = response.bytes().await.map_err(SyncError::Fetch)?;
        let mut snapshot: ConfigSnapshot = serde_json::from_slice(&body)?;

        let applied = self.overrides.apply(&mut snapshot);
        if !applied.is_empty() {
            tracing::debug!(overrides = ?applied, "Applied environment overrides");
        }

        validate_snapshot(&snapshot).map_err(SyncError::Validation)?;

        let snapshot = Arc::new(snapshot);
        self.cache
            .store(Some(Arc::new(CachedSnapshot::new(Arc::clone(&snapshot)))));
        self.updates.send_replace(Some(Arc::clone(&snapshot)));

        tracing::info!(
            version = %snapshot.version,
            auth_type = %snapshot.auth.kind,
            "Configuration snapshot applied"
        );
        Ok(snapshot)
    }

    /// Current snapshot, refreshed first if it is stale or missing.
    ///
    /// Concurrent callers hitting a stale cache may each fetch.
    pub async fn get(&self) -> Result<Arc<ConfigSnapshot>, SyncError> {
        if let Some(cached) = self.cache.load_full() {
            if !cached.is_stale(self.stale_after) {
                return Ok(Arc::clone(&cached.snapshot));
            }
            tracing::debug!(age = ?cached.age(), "Cached snapshot is stale, refreshing");
        }
        self.fetch().await
    }

    /// Lock-free read of whatever is cached, fresh or not.
    pub fn current(&self) -> Option<Arc<CachedSnapshot>> {
        self.cache.load_full()
    }

    /// Receive every newly published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ConfigSnapshot>>> {
        self.updates.subscribe()
    }

    /// Refresh every `interval` until shutdown fires.
    ///
    /// The first refresh happens one interval after the call.
    pub fn watch(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);

        tokio::spawn(async move {
            tracing::info!(interval = ?interval, endpoint = %this.endpoint, "Config watcher started");

            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = this.fetch().await {
                            tracing::error!(error = %e, "Config refresh failed. Keeping current configuration.");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Config watcher received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

fn snapshot_endpoint(base: &str, cluster_id: &str) -> Result<Url, SyncError> {
    let invalid = |reason: String| SyncError::Endpoint {
        url: base.to_string(),
        reason,
    };

    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base url".to_string()));
    }
    url.path_segments_mut()
        .map_err(|_| invalid("not a base url".to_string()))?
        .pop_if_empty()
        .extend(["api", "v1", "clusters", cluster_id, "config"]);
    Ok(url)
}
