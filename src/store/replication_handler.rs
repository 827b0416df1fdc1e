use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Registry;
use crate::InMessage;
use crate::Replication;
use crate::ReplicationError;
use crate::Result;
use crate::SyncRequest;

/// Bridges the replication transport and the namespace catalogs.
///
/// Holds the registry weakly: the registry owns the catalogs, the catalogs
/// own their replicators, and the transport must not keep any of them alive.
pub(crate) struct ReplicationHandler {
    registry: Weak<Registry>,
    replication: Arc<dyn Replication>,
    sync_wait: Duration,
    send_timeout: Duration,
}

impl ReplicationHandler {
    pub(crate) fn new(
        registry: Weak<Registry>,
        replication: Arc<dyn Replication>,
        sync_wait: Duration,
        send_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(ReplicationHandler {
            registry,
            replication,
            sync_wait,
            send_timeout,
        })
    }

    /// Pulls peer state, then starts applying peer traffic and answering
    /// sync requests of joining peers.
    pub(crate) async fn activate(self: Arc<Self>) {
        let synced = self.synchronize().await;
        info!(synced, "Initial catalog synchronization finished");

        if let Some(requests) = self.replication.sync_requests() {
            tokio::spawn(self.clone().serve_sync_requests(requests));
        }
        if let Some(notifications) = self.replication.notifications() {
            tokio::spawn(self.clone().replicate(notifications));
        }
    }

    async fn synchronize(&self) -> usize {
        let mut messages = self.replication.sync(self.sync_wait);
        let mut synced = 0;
        while let Some(message) = messages.recv().await {
            match self.dispatch(message).await {
                Ok(()) => synced += 1,
                Err(e) => warn!("Failed to apply sync message: {:?}", e),
            }
        }
        synced
    }

    async fn replicate(
        self: Arc<Self>,
        mut notifications: mpsc::Receiver<InMessage>,
    ) {
        while let Some(message) = notifications.recv().await {
            if self.registry.strong_count() == 0 {
                break;
            }
            if let Err(e) = self.dispatch(message).await {
                warn!("Failed to apply replicated message: {:?}", e);
            }
        }
        debug!("Replication notification loop stopped");
    }

    async fn serve_sync_requests(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<SyncRequest>,
    ) {
        while let Some(out) = requests.recv().await {
            tokio::spawn(self.clone().export_all(out));
        }
        debug!("Sync request loop stopped");
    }

    /// Streams every namespace into `out`, then drops it to end the sync
    async fn export_all(
        self: Arc<Self>,
        out: SyncRequest,
    ) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let sinks: Vec<_> = registry
            .handles()
            .into_iter()
            .filter_map(|(namespace, handle)| handle.sink.map(|sink| (namespace, sink)))
            .collect();

        let send_timeout = self.send_timeout;
        let exports = sinks.iter().map(|(namespace, sink)| {
            let out = &out;
            async move {
                match sink.export_sync(out, send_timeout).await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(namespace = %namespace, "Sync export failed: {:?}", e);
                        0
                    }
                }
            }
        });
        let exported: usize = join_all(exports).await.into_iter().sum();
        info!(namespaces = sinks.len(), exported, "Served sync request");
    }

    async fn dispatch(
        &self,
        message: InMessage,
    ) -> Result<()> {
        let registry = self.registry.upgrade().ok_or(ReplicationError::Stopped)?;
        let handle = registry.get_handle(&message.namespace)?;
        match handle.sink {
            Some(sink) => sink.notify(message).await,
            None => Err(crate::Error::Fatal(format!(
                "catalog of namespace {} is not replicated",
                message.namespace
            ))),
        }
    }
}
