use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::OutMessage;
use crate::utils::send_with_timeout;
use crate::MemberId;
use crate::Namespace;
use crate::ReplicationError;
use crate::Result;

/// Per-namespace outbound replication handle
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Replicator: Send + Sync + 'static {
    /// Delivers `data` to every connected peer
    async fn broadcast(
        &self,
        data: Bytes,
    ) -> Result<()>;

    /// Delivers `data` to a single peer
    async fn send(
        &self,
        member_id: MemberId,
        data: Bytes,
    ) -> Result<()>;
}

/// Replicator feeding the transport's broadcast and repair queues
pub(crate) struct NamespaceReplicator {
    pub(crate) namespace: Namespace,
    pub(crate) broadcast_tx: mpsc::Sender<OutMessage>,
    pub(crate) repair_tx: mpsc::Sender<OutMessage>,
    pub(crate) send_timeout: Duration,
    pub(crate) done: CancellationToken,
}

#[async_trait]
impl Replicator for NamespaceReplicator {
    async fn broadcast(
        &self,
        data: Bytes,
    ) -> Result<()> {
        if self.done.is_cancelled() {
            return Err(ReplicationError::Stopped.into());
        }
        let message = OutMessage::broadcast(self.namespace.clone(), data);
        send_with_timeout(&self.broadcast_tx, message, self.send_timeout, "broadcast").await
    }

    async fn send(
        &self,
        member_id: MemberId,
        data: Bytes,
    ) -> Result<()> {
        if self.done.is_cancelled() {
            return Err(ReplicationError::Stopped.into());
        }
        let message = OutMessage::to(member_id, self.namespace.clone(), data);
        send_with_timeout(&self.repair_tx, message, self.send_timeout, "repair").await
    }
}
