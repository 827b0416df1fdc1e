use std::sync::Arc;
use std::time::Duration;

use super::Catalog;
use super::InMemoryCatalog;
use super::MultiCatalog;
use super::ReplicatedCatalog;
use super::ReplicationSink;
use crate::CatalogConfig;
use crate::Namespace;
use crate::Replication;
use crate::Result;
use crate::StoreMetrics;

/// A freshly created namespace catalog, with its replication inbound side
/// when the catalog is replicated.
#[derive(Clone)]
pub struct CatalogHandle {
    pub catalog: Arc<dyn Catalog>,
    pub sink: Option<Arc<dyn ReplicationSink>>,
}

impl CatalogHandle {
    pub fn local(catalog: Arc<dyn Catalog>) -> Self {
        CatalogHandle { catalog, sink: None }
    }
}

/// Creates the catalog of a namespace on first use
pub trait CatalogFactory: Send + Sync + 'static {
    fn create_catalog(
        &self,
        namespace: &Namespace,
    ) -> Result<CatalogHandle>;
}

pub struct InMemoryFactory {
    config: CatalogConfig,
    metrics: Arc<StoreMetrics>,
}

impl InMemoryFactory {
    /// # Errors
    /// Returns `Error::InvalidConfig` when `config` fails validation
    pub fn new(
        config: CatalogConfig,
        metrics: Arc<StoreMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(InMemoryFactory { config, metrics })
    }
}

impl CatalogFactory for InMemoryFactory {
    fn create_catalog(
        &self,
        namespace: &Namespace,
    ) -> Result<CatalogHandle> {
        let catalog = InMemoryCatalog::new(namespace.clone(), self.config.clone(), self.metrics.clone())?;
        Ok(CatalogHandle::local(Arc::new(catalog)))
    }
}

/// Wraps the catalogs of `local` with a [`ReplicatedCatalog`]
pub struct ReplicatedFactory {
    local: Arc<dyn CatalogFactory>,
    replication: Arc<dyn Replication>,
    queue_size: usize,
    send_timeout: Duration,
}

impl ReplicatedFactory {
    pub fn new(
        local: Arc<dyn CatalogFactory>,
        replication: Arc<dyn Replication>,
        queue_size: usize,
        send_timeout: Duration,
    ) -> Self {
        ReplicatedFactory {
            local,
            replication,
            queue_size,
            send_timeout,
        }
    }
}

impl CatalogFactory for ReplicatedFactory {
    fn create_catalog(
        &self,
        namespace: &Namespace,
    ) -> Result<CatalogHandle> {
        let local = self.local.create_catalog(namespace)?;
        let replicator = self.replication.get_replicator(namespace)?;
        let catalog = ReplicatedCatalog::new(
            namespace.clone(),
            local.catalog,
            replicator,
            self.queue_size,
            self.send_timeout,
        );
        Ok(CatalogHandle {
            catalog: catalog.clone(),
            sink: Some(catalog),
        })
    }
}

/// Pairs the primary catalog with auxiliary catalogs (search indexes and
/// the like) that mirror its writes
pub struct MultiFactory {
    primary: Arc<dyn CatalogFactory>,
    auxiliaries: Vec<Arc<dyn CatalogFactory>>,
}

impl MultiFactory {
    pub fn new(
        primary: Arc<dyn CatalogFactory>,
        auxiliaries: Vec<Arc<dyn CatalogFactory>>,
    ) -> Self {
        MultiFactory { primary, auxiliaries }
    }
}

impl CatalogFactory for MultiFactory {
    fn create_catalog(
        &self,
        namespace: &Namespace,
    ) -> Result<CatalogHandle> {
        let primary = self.primary.create_catalog(namespace)?;
        let auxiliaries = self
            .auxiliaries
            .iter()
            .map(|factory| factory.create_catalog(namespace).map(|handle| handle.catalog))
            .collect::<Result<Vec<_>>>()?;

        Ok(CatalogHandle {
            catalog: Arc::new(MultiCatalog::new(namespace.clone(), primary.catalog, auxiliaries)),
            sink: primary.sink,
        })
    }
}
