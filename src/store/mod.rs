//! Namespace catalogs.
//!
//! A [`Catalog`] is the per-namespace store of service instances. Catalogs
//! are composed by factories: an in-memory store at the bottom, an optional
//! replication decorator, and an optional fan-out to auxiliary catalogs.
//! [`Registry`] routes a namespace to its lazily created catalog.
mod catalog_map;
mod expiry;
mod factory;
mod inmem_catalog;
mod instance;
mod multi_catalog;
mod replicated_catalog;
mod replication_handler;
mod replication_message;

pub use catalog_map::*;
pub(crate) use expiry::*;
pub use factory::*;
pub use inmem_catalog::*;
pub use instance::*;
pub use multi_catalog::*;
pub use replicated_catalog::*;
pub(crate) use replication_handler::*;
pub use replication_message::*;

#[cfg(test)]
mod catalog_map_test;
#[cfg(test)]
mod replication_message_test;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::InMessage;
use crate::OutMessage;
use crate::Result;
use crate::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Optional filter applied to listed instances
pub type Predicate = Arc<dyn Fn(&ServiceInstance) -> bool + Send + Sync>;

/// Per-namespace store of service instances.
///
/// Every mutation returns a snapshot of the instance as stored after the
/// operation; callers never observe later changes through it.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Creates or overwrites an instance and starts its lease
    async fn register(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance>;

    /// Stores an instance another member already accepted. Keeps its id and
    /// registration time and is not charged against the namespace quota.
    async fn register_replica(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance>;

    async fn deregister(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance>;

    /// Restarts the lease of a live instance
    async fn renew(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance>;

    /// Changes the status of a live instance; also restarts its lease
    async fn set_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
    ) -> StoreResult<ServiceInstance>;

    async fn instance(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance>;

    /// Live instances of `service_name` passing `predicate`.
    ///
    /// Fails with `NoSuchServiceName` when the service has no live instance
    /// at all; succeeds with an empty list when only the predicate rejects.
    async fn list(
        &self,
        service_name: &str,
        predicate: Option<Predicate>,
    ) -> StoreResult<Vec<ServiceInstance>>;

    /// Services having at least one live instance passing `predicate`
    async fn list_services(
        &self,
        predicate: Option<Predicate>,
    ) -> Vec<Service>;

    /// Removes instances whose lease ran out; returns how many were evicted
    fn sweep_expired(&self) -> usize {
        0
    }
}

/// Inbound side of a replicated catalog
#[async_trait]
pub trait ReplicationSink: Send + Sync + 'static {
    /// Queues a message received from a peer for application
    async fn notify(
        &self,
        message: InMessage,
    ) -> Result<()>;

    /// Streams every live instance as a register message into `out`
    async fn export_sync(
        &self,
        out: &mpsc::Sender<OutMessage>,
        send_timeout: Duration,
    ) -> Result<usize>;
}
