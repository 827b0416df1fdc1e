//! Replication decorator around a namespace catalog.
//!
//! Local mutations are applied to the wrapped catalog first and broadcast
//! to peers only once they succeed. Peer mutations are queued through
//! [`ReplicationSink::notify`] and applied by a single worker task; they
//! never trigger a broadcast themselves.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::Catalog;
use super::CatalogMutation;
use super::InstanceStatus;
use super::Predicate;
use super::ReplicationSink;
use super::Service;
use super::ServiceInstance;
use super::StoreResult;
use crate::utils::send_with_timeout;
use crate::InMessage;
use crate::MemberId;
use crate::Namespace;
use crate::OutMessage;
use crate::Replicator;
use crate::Result;
use crate::READ_REPAIR_REQUESTS;

pub struct ReplicatedCatalog {
    namespace: Namespace,
    local: Arc<dyn Catalog>,
    replicator: Arc<dyn Replicator>,
    inbound_tx: mpsc::Sender<InMessage>,
    send_timeout: Duration,
}

impl ReplicatedCatalog {
    /// Wraps `local` and spawns the inbound worker.
    ///
    /// The worker stops once the returned catalog is dropped.
    pub fn new(
        namespace: Namespace,
        local: Arc<dyn Catalog>,
        replicator: Arc<dyn Replicator>,
        queue_size: usize,
        send_timeout: Duration,
    ) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(queue_size);
        let applier = InboundApplier {
            namespace: namespace.clone(),
            local: local.clone(),
            replicator: replicator.clone(),
        };
        tokio::spawn(applier.run(inbound_rx));

        Arc::new(ReplicatedCatalog {
            namespace,
            local,
            replicator,
            inbound_tx,
            send_timeout,
        })
    }

    async fn broadcast(
        &self,
        mutation: CatalogMutation,
    ) {
        let rep_type = mutation.rep_type();
        let data = match mutation.encode() {
            Ok(data) => data,
            Err(e) => {
                error!(namespace = %self.namespace, ?rep_type, "Failed to encode replication message: {:?}", e);
                return;
            }
        };
        if let Err(e) = self.replicator.broadcast(data).await {
            warn!(namespace = %self.namespace, ?rep_type, "Failed to broadcast: {:?}", e);
        }
    }
}

#[async_trait]
impl Catalog for ReplicatedCatalog {
    async fn register(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        let registered = self.local.register(instance).await?;
        self.broadcast(CatalogMutation::Register(registered.clone())).await;
        Ok(registered)
    }

    /// Applied locally only; replicas are never rebroadcast
    async fn register_replica(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        self.local.register_replica(instance).await
    }

    async fn deregister(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        let removed = self.local.deregister(instance_id).await?;
        self.broadcast(CatalogMutation::Deregister(instance_id.to_string())).await;
        Ok(removed)
    }

    async fn renew(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        let renewed = self.local.renew(instance_id).await?;
        self.broadcast(CatalogMutation::Renew(instance_id.to_string())).await;
        Ok(renewed)
    }

    async fn set_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
    ) -> StoreResult<ServiceInstance> {
        let updated = self.local.set_status(instance_id, status).await?;
        self.broadcast(CatalogMutation::SetStatus {
            instance_id: instance_id.to_string(),
            status,
        })
        .await;
        Ok(updated)
    }

    async fn instance(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        self.local.instance(instance_id).await
    }

    async fn list(
        &self,
        service_name: &str,
        predicate: Option<Predicate>,
    ) -> StoreResult<Vec<ServiceInstance>> {
        self.local.list(service_name, predicate).await
    }

    async fn list_services(
        &self,
        predicate: Option<Predicate>,
    ) -> Vec<Service> {
        self.local.list_services(predicate).await
    }

    fn sweep_expired(&self) -> usize {
        self.local.sweep_expired()
    }
}

#[async_trait]
impl ReplicationSink for ReplicatedCatalog {
    async fn notify(
        &self,
        message: InMessage,
    ) -> Result<()> {
        send_with_timeout(&self.inbound_tx, message, self.send_timeout, "catalog").await
    }

    async fn export_sync(
        &self,
        out: &mpsc::Sender<OutMessage>,
        send_timeout: Duration,
    ) -> Result<usize> {
        let mut exported = 0;
        for service in self.local.list_services(None).await {
            // The service may have expired since it was listed
            let Ok(instances) = self.local.list(&service.service_name, None).await else {
                continue;
            };
            for instance in instances {
                let data = CatalogMutation::Register(instance).encode()?;
                let message = OutMessage::broadcast(self.namespace.clone(), data);
                send_with_timeout(out, message, send_timeout, "sync").await?;
                exported += 1;
            }
        }
        debug!(namespace = %self.namespace, exported, "Exported namespace for sync");
        Ok(exported)
    }
}

/// Applies peer mutations to the local catalog, one at a time
struct InboundApplier {
    namespace: Namespace,
    local: Arc<dyn Catalog>,
    replicator: Arc<dyn Replicator>,
}

impl InboundApplier {
    async fn run(
        self,
        mut inbound_rx: mpsc::Receiver<InMessage>,
    ) {
        while let Some(message) = inbound_rx.recv().await {
            self.apply(message).await;
        }
        debug!(namespace = %self.namespace, "Inbound replication worker stopped");
    }

    async fn apply(
        &self,
        message: InMessage,
    ) {
        let mutation = match CatalogMutation::decode(&message.data) {
            Ok(mutation) => mutation,
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    from = %message.member_id,
                    "Dropping undecodable replication message: {:?}",
                    e
                );
                return;
            }
        };
        trace!(namespace = %self.namespace, from = %message.member_id, ?mutation, "Applying replicated mutation");

        let from = message.member_id;
        match mutation {
            CatalogMutation::Register(instance) => {
                if let Err(e) = self.local.register_replica(instance).await {
                    debug!(namespace = %self.namespace, "Replicated register failed: {}", e);
                }
            }
            CatalogMutation::Deregister(id) => {
                if let Err(e) = self.local.deregister(&id).await {
                    debug!(namespace = %self.namespace, "Replicated deregister failed: {}", e);
                }
            }
            CatalogMutation::Renew(id) => {
                if let Err(e) = self.local.renew(&id).await {
                    debug!(namespace = %self.namespace, id = %id, "Replicated renew failed, requesting repair: {}", e);
                    self.request_repair(from, id).await;
                }
            }
            CatalogMutation::SetStatus { instance_id, status } => {
                if let Err(e) = self.local.set_status(&instance_id, status).await {
                    debug!(namespace = %self.namespace, "Replicated set status failed: {}", e);
                }
            }
            CatalogMutation::ReadRepair(id) => self.answer_repair(from, &id).await,
        }
    }

    /// Asks the member that renewed `id` to send the full instance back
    async fn request_repair(
        &self,
        from: MemberId,
        id: String,
    ) {
        READ_REPAIR_REQUESTS.inc();
        self.send(from, CatalogMutation::ReadRepair(id)).await;
    }

    async fn answer_repair(
        &self,
        from: MemberId,
        id: &str,
    ) {
        match self.local.instance(id).await {
            Ok(instance) => self.send(from, CatalogMutation::Register(instance)).await,
            Err(e) => debug!(namespace = %self.namespace, id, "Cannot answer read repair: {}", e),
        }
    }

    async fn send(
        &self,
        to: MemberId,
        mutation: CatalogMutation,
    ) {
        let data = match mutation.encode() {
            Ok(data) => data,
            Err(e) => {
                error!(namespace = %self.namespace, "Failed to encode replication message: {:?}", e);
                return;
            }
        };
        if let Err(e) = self.replicator.send(to.clone(), data).await {
            warn!(namespace = %self.namespace, to = %to, "Failed to send to peer: {:?}", e);
        }
    }
}
