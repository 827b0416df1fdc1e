//! Namespace router.
//!
//! Maps each namespace to its catalog, creating it through the configured
//! factory chain on first access. The map lock is held only while looking
//! up or creating an entry, never across catalog operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;

use super::Catalog;
use super::CatalogFactory;
use super::CatalogHandle;
use super::InMemoryFactory;
use super::MultiFactory;
use super::ReplicatedFactory;
use super::ReplicationHandler;
use crate::CatalogConfig;
use crate::Namespace;
use crate::Replication;
use crate::ReplicationConfig;
use crate::Result;
use crate::StoreMetrics;

pub struct Registry {
    factory: Arc<dyn CatalogFactory>,
    catalogs: Mutex<HashMap<Namespace, CatalogHandle>>,
}

impl Registry {
    pub fn new(factory: Arc<dyn CatalogFactory>) -> Self {
        Registry {
            factory,
            catalogs: Mutex::new(HashMap::new()),
        }
    }

    /// Catalog of `namespace`, created on first access
    pub fn get_catalog(
        &self,
        namespace: &Namespace,
    ) -> Result<Arc<dyn Catalog>> {
        Ok(self.get_handle(namespace)?.catalog)
    }

    pub(crate) fn get_handle(
        &self,
        namespace: &Namespace,
    ) -> Result<CatalogHandle> {
        let mut catalogs = self.catalogs.lock();
        if let Some(handle) = catalogs.get(namespace) {
            return Ok(handle.clone());
        }
        let handle = self.factory.create_catalog(namespace)?;
        info!(namespace = %namespace, "Created namespace catalog");
        catalogs.insert(namespace.clone(), handle.clone());
        Ok(handle)
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces: Vec<Namespace> = self.catalogs.lock().keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    pub(crate) fn handles(&self) -> Vec<(Namespace, CatalogHandle)> {
        self.catalogs
            .lock()
            .iter()
            .map(|(namespace, handle)| (namespace.clone(), handle.clone()))
            .collect()
    }

    /// Evicts expired instances in every namespace
    pub fn sweep_expired(&self) -> usize {
        self.handles()
            .iter()
            .map(|(_, handle)| handle.catalog.sweep_expired())
            .sum()
    }
}

/// Assembles the factory chain: in-memory, then replication, then
/// auxiliary fan-out.
pub struct RegistryBuilder {
    config: CatalogConfig,
    replication: Option<(Arc<dyn Replication>, ReplicationConfig)>,
    auxiliaries: Vec<Arc<dyn CatalogFactory>>,
    metrics: Option<Arc<StoreMetrics>>,
}

impl RegistryBuilder {
    pub fn new(config: CatalogConfig) -> Self {
        RegistryBuilder {
            config,
            replication: None,
            auxiliaries: Vec::new(),
            metrics: None,
        }
    }

    pub fn replication(
        mut self,
        replication: Arc<dyn Replication>,
        config: ReplicationConfig,
    ) -> Self {
        self.replication = Some((replication, config));
        self
    }

    pub fn auxiliary(
        mut self,
        factory: Arc<dyn CatalogFactory>,
    ) -> Self {
        self.auxiliaries.push(factory);
        self
    }

    /// Defaults to [`StoreMetrics::global`]
    pub fn metrics(
        mut self,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the registry. With replication enabled this waits for the
    /// initial sync, up to the configured sync wait.
    pub async fn build(self) -> Result<Arc<Registry>> {
        let metrics = self.metrics.unwrap_or_else(StoreMetrics::global);

        let mut factory: Arc<dyn CatalogFactory> = Arc::new(InMemoryFactory::new(self.config.clone(), metrics)?);
        if let Some((replication, replication_config)) = &self.replication {
            factory = Arc::new(ReplicatedFactory::new(
                factory,
                replication.clone(),
                replication_config.catalog_queue_size,
                replication_config.send_timeout(),
            ));
        }
        if !self.auxiliaries.is_empty() {
            factory = Arc::new(MultiFactory::new(factory, self.auxiliaries));
        }

        let registry = Arc::new(Registry::new(factory));
        spawn_sweeper(Arc::downgrade(&registry), self.config.sweep_interval());

        if let Some((replication, replication_config)) = self.replication {
            let handler = ReplicationHandler::new(
                Arc::downgrade(&registry),
                replication,
                self.config.sync_wait(),
                replication_config.send_timeout(),
            );
            handler.activate().await;
        }
        Ok(registry)
    }
}

/// Periodic eviction; stops once the registry is dropped
fn spawn_sweeper(
    registry: Weak<Registry>,
    period: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(registry) = registry.upgrade() else {
                break;
            };
            let evicted = registry.sweep_expired();
            if evicted > 0 {
                debug!(evicted, "Swept expired instances");
            }
        }
    });
}
