use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::Catalog;
use super::InstanceStatus;
use super::Predicate;
use super::Service;
use super::ServiceInstance;
use super::StoreResult;
use crate::Namespace;

/// Fans writes out to auxiliary catalogs; reads are served by the primary.
///
/// Auxiliaries receive the instance as stored by the primary, so they see
/// the same id and timestamps. A local registration goes through each
/// auxiliary's own quota, a replicated one does not. Auxiliary failures are
/// logged, never returned.
pub struct MultiCatalog {
    namespace: Namespace,
    primary: Arc<dyn Catalog>,
    auxiliaries: Vec<Arc<dyn Catalog>>,
}

impl MultiCatalog {
    pub fn new(
        namespace: Namespace,
        primary: Arc<dyn Catalog>,
        auxiliaries: Vec<Arc<dyn Catalog>>,
    ) -> Self {
        MultiCatalog {
            namespace,
            primary,
            auxiliaries,
        }
    }

    fn log_failure<T>(
        &self,
        op: &'static str,
        result: StoreResult<T>,
    ) {
        if let Err(e) = result {
            warn!(namespace = %self.namespace, op, "Auxiliary catalog failed: {}", e);
        }
    }
}

#[async_trait]
impl Catalog for MultiCatalog {
    async fn register(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        let registered = self.primary.register(instance).await?;
        for auxiliary in &self.auxiliaries {
            self.log_failure("register", auxiliary.register(registered.clone()).await);
        }
        Ok(registered)
    }

    async fn register_replica(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        let registered = self.primary.register_replica(instance).await?;
        for auxiliary in &self.auxiliaries {
            self.log_failure("register_replica", auxiliary.register_replica(registered.clone()).await);
        }
        Ok(registered)
    }

    async fn deregister(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        let removed = self.primary.deregister(instance_id).await?;
        for auxiliary in &self.auxiliaries {
            self.log_failure("deregister", auxiliary.deregister(instance_id).await);
        }
        Ok(removed)
    }

    async fn renew(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        let renewed = self.primary.renew(instance_id).await?;
        for auxiliary in &self.auxiliaries {
            self.log_failure("renew", auxiliary.renew(instance_id).await);
        }
        Ok(renewed)
    }

    async fn set_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
    ) -> StoreResult<ServiceInstance> {
        let updated = self.primary.set_status(instance_id, status).await?;
        for auxiliary in &self.auxiliaries {
            self.log_failure("set_status", auxiliary.set_status(instance_id, status).await);
        }
        Ok(updated)
    }

    async fn instance(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        self.primary.instance(instance_id).await
    }

    async fn list(
        &self,
        service_name: &str,
        predicate: Option<Predicate>,
    ) -> StoreResult<Vec<ServiceInstance>> {
        self.primary.list(service_name, predicate).await
    }

    async fn list_services(
        &self,
        predicate: Option<Predicate>,
    ) -> Vec<Service> {
        self.primary.list_services(predicate).await
    }

    fn sweep_expired(&self) -> usize {
        let evicted = self.primary.sweep_expired();
        for auxiliary in &self.auxiliaries {
            auxiliary.sweep_expired();
        }
        evicted
    }
}
