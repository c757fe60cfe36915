//! Bounded, non-blocking audit queue.
//!
//! Producers never wait: when the queue is full the entry is dropped and
//! counted. A fixed pool of workers drains the queue to the collector.

use std::net::{AddrParseError, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::audit::entry::{AccessLogEntry, Action, Protocol};
use crate::audit::worker::{SharedReceiver, Worker};
use crate::auth::Identity;
use crate::config::AuditConfig;
use crate::lifecycle::Shutdown;
use crate::observability::MetricsRecorder;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid audit collector address '{address}': {source}")]
    InvalidCollector {
        address: String,
        #[source]
        source: AddrParseError,
    },
}

/// HTTP request details attached to an audit entry.
#[derive(Debug, Clone, Default)]
pub struct HttpDetails {
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub bytes_sent: Option<u64>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub reason: Option<String>,
}

struct Inner {
    tx: mpsc::Sender<AccessLogEntry>,
    rx: SharedReceiver,
    capacity: usize,
    dropped: AtomicU64,
    metrics: MetricsRecorder,
    collector: SocketAddr,
    hostname: Arc<str>,
    app_name: Arc<str>,
    worker_count: usize,
    stop: Shutdown,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to the audit pipeline. Clones share one queue.
#[derive(Clone, Default)]
pub struct AuditPipeline {
    inner: Option<Arc<Inner>>,
}

impl AuditPipeline {
    /// A pipeline that accepts and discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create the queue. Workers are not running until [`AuditPipeline::spawn_workers`].
    pub fn new(config: &AuditConfig, metrics: MetricsRecorder) -> Result<Self, AuditError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let collector: SocketAddr =
            config
                .collector_address
                .parse()
                .map_err(|source| AuditError::InvalidCollector {
                    address: config.collector_address.clone(),
                    source,
                })?;
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        Ok(Self {
            inner: Some(Arc::new(Inner {
                tx,
                rx: Arc::new(Mutex::new(rx)),
                capacity,
                dropped: AtomicU64::new(0),
                metrics,
                collector,
                hostname: resolve_hostname(config).into(),
                app_name: config.app_name.as_str().into(),
                worker_count: config.workers.max(1),
                stop: Shutdown::new(),
                workers: Mutex::new(Vec::new()),
            })),
        })
    }

    /// Create the queue and start the delivery workers.
    pub async fn start(config: &AuditConfig, metrics: MetricsRecorder) -> Result<Self, AuditError> {
        let pipeline = Self::new(config, metrics)?;
        pipeline.spawn_workers().await;
        Ok(pipeline)
    }

    pub async fn spawn_workers(&self) {
        let Some(inner) = &self.inner else {
            return;
        };

        let mut workers = inner.workers.lock().await;
        if !workers.is_empty() {
            return;
        }
        for id in 0..inner.worker_count {
            let worker = Worker::new(
                id,
                inner.collector,
                Arc::clone(&inner.hostname),
                Arc::clone(&inner.app_name),
            );
            workers.push(tokio::spawn(
                worker.run(Arc::clone(&inner.rx), inner.stop.subscribe()),
            ));
        }

        tracing::info!(
            collector = %inner.collector,
            workers = inner.worker_count,
            capacity = inner.capacity,
            "Audit pipeline started"
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Enqueue an entry without waiting. Overflow drops the entry.
    pub fn log(&self, entry: AccessLogEntry) {
        let Some(inner) = &self.inner else {
            return;
        };

        match inner.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                inner.dropped.fetch_add(1, Ordering::Relaxed);
                inner.metrics.record_audit_dropped();
                tracing::debug!(user_id = %entry.user_id, "Audit queue full, entry dropped");
            }
            Err(TrySendError::Closed(_)) => {
                inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn log_http(
        &self,
        identity: Option<&Identity>,
        source_ip: &str,
        target_host: &str,
        allowed: bool,
        details: HttpDetails,
    ) {
        let mut entry = AccessLogEntry::new(Protocol::Http, Action::from(allowed), source_ip, target_host)
            .with_identity(identity);
        entry.reason = details.reason;
        entry.method = Some(details.method);
        entry.path = Some(details.path);
        entry.status_code = Some(details.status_code);
        entry.bytes_sent = details.bytes_sent;
        entry.user_agent = details.user_agent;
        entry.request_id = details.request_id;
        self.log(entry);
    }

    pub fn log_tcp(&self, identity: Option<&Identity>, source_ip: &str, target_host: &str, allowed: bool) {
        self.log(
            AccessLogEntry::new(Protocol::Tcp, Action::from(allowed), source_ip, target_host)
                .with_identity(identity),
        );
    }

    pub fn log_udp(&self, identity: Option<&Identity>, source_ip: &str, target_host: &str, allowed: bool) {
        self.log(
            AccessLogEntry::new(Protocol::Udp, Action::from(allowed), source_ip, target_host)
                .with_identity(identity),
        );
    }

    /// Entries lost to overflow since start.
    pub fn dropped(&self) -> u64 {
        self.inner
            .as_ref()
            .map(|inner| inner.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Entries waiting for a worker.
    pub fn queue_depth(&self) -> usize {
        self.inner
            .as_ref()
            .map(|inner| inner.capacity - inner.tx.capacity())
            .unwrap_or(0)
    }

    /// Stop the workers and discard whatever is still queued.
    pub async fn shutdown(&self) {
        let Some(inner) = &self.inner else {
            return;
        };

        inner.stop.trigger();
        let workers = std::mem::take(&mut *inner.workers.lock().await);
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Audit worker panicked");
            }
        }

        let mut rx = inner.rx.lock().await;
        rx.close();
        let mut discarded = 0usize;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }

        tracing::info!(
            discarded,
            dropped = inner.dropped.load(Ordering::Relaxed),
            "Audit pipeline stopped"
        );
    }
}

fn resolve_hostname(config: &AuditConfig) -> String {
    config
        .hostname
        .clone()
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize) -> AuditConfig {
        AuditConfig {
            enabled: true,
            collector_address: "127.0.0.1:5514".into(),
            queue_capacity: capacity,
            hostname: Some("edge-test".into()),
            ..Default::default()
        }
    }

    fn entry(user: &str) -> AccessLogEntry {
        AccessLogEntry::new(Protocol::Tcp, Action::Allow, "10.0.0.1", "db:5432")
            .with_identity(Some(&Identity::new(user, user, Vec::<String>::new())))
    }

    #[test]
    fn test_disabled_pipeline_is_a_no_op() {
        let pipeline = AuditPipeline::new(&AuditConfig::default(), MetricsRecorder::new().unwrap()).unwrap();
        assert!(!pipeline.is_enabled());
        pipeline.log(entry("u-1"));
        assert_eq!(pipeline.dropped(), 0);
        assert_eq!(pipeline.queue_depth(), 0);
    }

    #[test]
    fn test_rejects_bad_collector() {
        let mut config = config(4);
        config.collector_address = "collector".into();
        assert!(matches!(
            AuditPipeline::new(&config, MetricsRecorder::new().unwrap()),
            Err(AuditError::InvalidCollector { .. })
        ));
    }

    #[tokio::test]
    async fn test_overflow_drops_and_counts() {
        let metrics = MetricsRecorder::new().unwrap();
        let pipeline = AuditPipeline::new(&config(2), metrics.clone()).unwrap();

        pipeline.log(entry("u-1"));
        pipeline.log(entry("u-2"));
        assert_eq!(pipeline.queue_depth(), 2);
        assert_eq!(pipeline.dropped(), 0);

        pipeline.log(entry("u-3"));
        assert_eq!(pipeline.dropped(), 1);
        assert_eq!(pipeline.queue_depth(), 2);
        assert!(metrics.render().contains("gateway_audit_dropped_total 1"));
    }

    #[tokio::test]
    async fn test_shutdown_discards_queue() {
        let pipeline = AuditPipeline::new(&config(8), MetricsRecorder::new().unwrap()).unwrap();
        pipeline.log(entry("u-1"));
        pipeline.log(entry("u-2"));

        pipeline.shutdown().await;

        pipeline.log(entry("u-3"));
        assert_eq!(pipeline.dropped(), 1);
    }

    #[test]
    fn test_hostname_prefers_config() {
        assert_eq!(resolve_hostname(&config(1)), "edge-test");
    }
}
