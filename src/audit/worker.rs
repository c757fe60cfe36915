//! Collector delivery worker.
//!
//! Each worker owns one datagram socket and pulls entries from the shared
//! queue until it is closed or shutdown fires.
//!
//! # State
//! ```text
//! Disconnected ──connect ok──▶ Connected
//!      ▲                          │
//!      └──────── send error ──────┘   (entry lost, reconnect attempted)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::audit::entry::AccessLogEntry;
use crate::audit::frame;

/// Queue end shared by every worker.
pub(crate) type SharedReceiver = Arc<Mutex<mpsc::Receiver<AccessLogEntry>>>;

enum Connection {
    Connected(UdpSocket),
    Disconnected,
}

pub(crate) struct Worker {
    id: usize,
    collector: SocketAddr,
    hostname: Arc<str>,
    app_name: Arc<str>,
    connection: Connection,
}

impl Worker {
    pub(crate) fn new(id: usize, collector: SocketAddr, hostname: Arc<str>, app_name: Arc<str>) -> Self {
        Self {
            id,
            collector,
            hostname,
            app_name,
            connection: Connection::Disconnected,
        }
    }

    pub(crate) async fn run(mut self, queue: SharedReceiver, mut shutdown: broadcast::Receiver<()>) {
        self.connect().await;

        loop {
            let entry = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                entry = next_entry(&queue) => match entry {
                    Some(entry) => entry,
                    None => break,
                },
            };
            self.ship(entry).await;
        }

        self.connection = Connection::Disconnected;
        tracing::debug!(worker = self.id, "Audit worker stopped");
    }

    async fn connect(&mut self) -> bool {
        let local = if self.collector.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

        let socket = match UdpSocket::bind(local).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(worker = self.id, error = %e, "Failed to bind audit socket");
                return false;
            }
        };
        if let Err(e) = socket.connect(self.collector).await {
            tracing::warn!(
                worker = self.id,
                collector = %self.collector,
                error = %e,
                "Failed to connect to audit collector"
            );
            return false;
        }

        self.connection = Connection::Connected(socket);
        true
    }

    async fn ship(&mut self, entry: AccessLogEntry) {
        if matches!(self.connection, Connection::Disconnected) && !self.connect().await {
            tracing::debug!(worker = self.id, "Audit collector unreachable, entry lost");
            return;
        }

        let datagram = match frame::encode(entry, &self.hostname, &self.app_name, Utc::now()) {
            Ok(datagram) => datagram,
            Err(e) => {
                tracing::warn!(worker = self.id, error = %e, "Failed to encode audit entry");
                return;
            }
        };

        let Connection::Connected(socket) = &self.connection else {
            return;
        };
        if let Err(e) = socket.send(datagram.as_bytes()).await {
            tracing::warn!(
                worker = self.id,
                collector = %self.collector,
                error = %e,
                "Audit send failed, reconnecting"
            );
            self.connection = Connection::Disconnected;
            self.connect().await;
        }
    }
}

async fn next_entry(queue: &Mutex<mpsc::Receiver<AccessLogEntry>>) -> Option<AccessLogEntry> {
    queue.lock().await.recv().await
}
