//! In-memory namespace catalog with lease expiry.
//!
//! All state of a namespace sits behind one `RwLock`. Expired entries are
//! evicted lazily: every operation first drains the [`ExpiryIndex`] under
//! the write lock when its earliest deadline is past, so readers never
//! observe an expired instance. A periodic [`Catalog::sweep_expired`] call
//! bounds memory for namespaces nobody reads.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use super::compute_instance_id;
use super::Catalog;
use super::Endpoint;
use super::ExpiryIndex;
use super::InstanceStatus;
use super::Predicate;
use super::Service;
use super::ServiceInstance;
use super::StoreResult;
use crate::CatalogConfig;
use crate::Namespace;
use crate::Result;
use crate::StoreError;
use crate::StoreMetrics;

pub const MAX_SERVICE_NAME_LENGTH: usize = 64;
pub const MAX_ENDPOINT_VALUE_LENGTH: usize = 64;
pub const MAX_METADATA_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    /// Accepted by another member, exempt from the quota
    Replica,
}

struct StoredInstance {
    instance: ServiceInstance,
    registered_at: Instant,
}

#[derive(Default)]
struct CatalogState {
    instances: HashMap<String, StoredInstance>,
    /// service name -> instance ids
    services: HashMap<String, HashSet<String>>,
    /// (service name, endpoint) -> instance id
    endpoints: HashMap<(String, Endpoint), String>,
    expiry: ExpiryIndex,
}

pub struct InMemoryCatalog {
    namespace: Namespace,
    config: CatalogConfig,
    state: RwLock<CatalogState>,
    metrics: Arc<StoreMetrics>,
}

impl InMemoryCatalog {
    /// # Errors
    /// Returns `Error::InvalidConfig` when `config` fails validation
    pub fn new(
        namespace: Namespace,
        config: CatalogConfig,
        metrics: Arc<StoreMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(InMemoryCatalog {
            namespace,
            config,
            state: RwLock::new(CatalogState::default()),
            metrics,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Live instance count
    pub fn len(&self) -> usize {
        self.read_live(|state| state.instances.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 0 selects the default TTL, anything else is clamped into bounds
    fn effective_ttl(
        &self,
        requested: Duration,
    ) -> Duration {
        if requested.is_zero() {
            return self.config.default_ttl();
        }
        requested.clamp(self.config.minimum_ttl(), self.config.maximum_ttl())
    }

    pub fn register_instance(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        self.store(instance, Origin::Local)
    }

    pub fn register_replica_instance(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        self.store(instance, Origin::Replica)
    }

    fn store(
        &self,
        mut instance: ServiceInstance,
        origin: Origin,
    ) -> StoreResult<ServiceInstance> {
        validate(&instance)?;
        instance.ttl = self.effective_ttl(instance.ttl);
        let is_replica = origin == Origin::Replica;

        let now = Instant::now();
        let mut state = self.state.write();
        self.evict_expired(&mut state, now);

        if instance.id.is_empty() {
            let key = (instance.service_name.clone(), instance.endpoint.clone());
            instance.id = match state.endpoints.get(&key) {
                Some(id) => id.clone(),
                None => compute_instance_id(&instance.service_name, &instance.endpoint),
            };
        }

        let exists = state.instances.contains_key(&instance.id);
        if !exists && !is_replica {
            if let Some(capacity) = self.config.capacity() {
                if state.instances.len() >= capacity {
                    debug!(
                        namespace = %self.namespace,
                        capacity,
                        "Registration rejected, namespace quota exceeded"
                    );
                    return Err(StoreError::quota_exceeded(capacity));
                }
            }
        }

        let mut registered_at = now;
        if let Some(previous) = self.detach(&mut state, &instance.id) {
            registered_at = previous.registered_at;
            if instance.registration_time.is_none() {
                instance.registration_time = previous.instance.registration_time;
            }
        }
        if instance.registration_time.is_none() {
            instance.registration_time = Some(SystemTime::now());
        }
        instance.last_renewal = Some(SystemTime::now());

        if !instance.metadata.is_empty() {
            self.metrics.metadata_length.observe(instance.metadata.len() as f64);
        }
        if !instance.tags.is_empty() {
            self.metrics.tags_length.observe(instance.tags.len() as f64);
        }

        let snapshot = instance.clone();
        state.expiry.schedule(&instance.id, now + instance.ttl);
        self.attach(
            &mut state,
            StoredInstance {
                instance,
                registered_at,
            },
        );

        debug!(
            namespace = %self.namespace,
            id = %snapshot.id,
            service = %snapshot.service_name,
            overwrite = exists,
            replica = is_replica,
            "Registered instance"
        );
        Ok(snapshot)
    }

    pub fn deregister_instance(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        let now = Instant::now();
        let mut state = self.state.write();
        self.evict_expired(&mut state, now);

        let stored = self
            .detach(&mut state, instance_id)
            .ok_or_else(|| StoreError::no_such_instance(instance_id))?;
        state.expiry.cancel(instance_id);
        self.metrics
            .lifetime
            .observe(now.duration_since(stored.registered_at).as_secs_f64());

        debug!(namespace = %self.namespace, id = instance_id, "Deregistered instance");
        Ok(stored.instance)
    }

    pub fn renew_instance(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        self.touch(instance_id, None)
    }

    pub fn set_instance_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
    ) -> StoreResult<ServiceInstance> {
        self.touch(instance_id, Some(status))
    }

    pub fn get_instance(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        self.read_live(|state| {
            state
                .instances
                .get(instance_id)
                .map(|stored| stored.instance.clone())
                .ok_or_else(|| StoreError::no_such_instance(instance_id))
        })
    }

    pub fn list_instances(
        &self,
        service_name: &str,
        predicate: Option<&Predicate>,
    ) -> StoreResult<Vec<ServiceInstance>> {
        self.read_live(|state| {
            let ids = state
                .services
                .get(service_name)
                .filter(|ids| !ids.is_empty())
                .ok_or_else(|| StoreError::no_such_service(service_name))?;

            let mut instances = Vec::with_capacity(ids.len());
            for id in ids {
                let stored = state
                    .instances
                    .get(id)
                    .ok_or_else(|| StoreError::internal("service index is out of sync", format!("unknown instance {id}")))?;
                if predicate.map_or(true, |p| p(&stored.instance)) {
                    instances.push(stored.instance.clone());
                }
            }
            instances.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(instances)
        })
    }

    pub fn list_service_names(
        &self,
        predicate: Option<&Predicate>,
    ) -> Vec<Service> {
        self.read_live(|state| {
            let mut services: Vec<Service> = state
                .services
                .iter()
                .filter(|(_, ids)| match predicate {
                    None => !ids.is_empty(),
                    Some(p) => ids
                        .iter()
                        .filter_map(|id| state.instances.get(id))
                        .any(|stored| p(&stored.instance)),
                })
                .map(|(name, _)| Service {
                    service_name: name.clone(),
                })
                .collect();
            services.sort();
            services
        })
    }

    /// Evicts every instance whose lease ran out
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        if !self.state.read().expiry.may_have_expired(now) {
            return 0;
        }
        let mut state = self.state.write();
        self.evict_expired(&mut state, now)
    }

    fn touch(
        &self,
        instance_id: &str,
        status: Option<InstanceStatus>,
    ) -> StoreResult<ServiceInstance> {
        let now = Instant::now();
        let mut state = self.state.write();
        self.evict_expired(&mut state, now);

        let stored = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| StoreError::no_such_instance(instance_id))?;
        if let Some(status) = status {
            stored.instance.status = status;
        }
        stored.instance.last_renewal = Some(SystemTime::now());
        let ttl = stored.instance.ttl;
        let snapshot = stored.instance.clone();
        state.expiry.schedule(instance_id, now + ttl);

        trace!(namespace = %self.namespace, id = instance_id, ?status, "Renewed instance");
        Ok(snapshot)
    }

    /// Runs `f` on a state without expired entries, upgrading to the write
    /// lock only when the earliest deadline has passed.
    fn read_live<R>(
        &self,
        f: impl FnOnce(&CatalogState) -> R,
    ) -> R {
        let now = Instant::now();
        {
            let state = self.state.read();
            if !state.expiry.may_have_expired(now) {
                return f(&state);
            }
        }
        let mut state = self.state.write();
        self.evict_expired(&mut state, now);
        f(&state)
    }

    fn evict_expired(
        &self,
        state: &mut CatalogState,
        now: Instant,
    ) -> usize {
        let mut evicted = 0;
        for id in state.expiry.drain_expired(now) {
            if let Some(stored) = self.detach(state, &id) {
                self.metrics.expirations.inc();
                self.metrics
                    .lifetime
                    .observe(now.duration_since(stored.registered_at).as_secs_f64());
                debug!(
                    namespace = %self.namespace,
                    id = %id,
                    service = %stored.instance.service_name,
                    "Instance lease expired"
                );
                evicted += 1;
            }
        }
        evicted
    }

    fn attach(
        &self,
        state: &mut CatalogState,
        stored: StoredInstance,
    ) {
        let instance = &stored.instance;
        if !instance.metadata.is_empty() {
            self.metrics.metadata_instances.inc();
        }
        if !instance.tags.is_empty() {
            self.metrics.tags_instances.inc();
        }
        self.metrics.instances.inc();

        state
            .services
            .entry(instance.service_name.clone())
            .or_default()
            .insert(instance.id.clone());
        state.endpoints.insert(
            (instance.service_name.clone(), instance.endpoint.clone()),
            instance.id.clone(),
        );
        state.instances.insert(instance.id.clone(), stored);
    }

    /// Removes `id` from every index except the expiry index
    fn detach(
        &self,
        state: &mut CatalogState,
        id: &str,
    ) -> Option<StoredInstance> {
        let stored = state.instances.remove(id)?;
        let instance = &stored.instance;

        if let Some(ids) = state.services.get_mut(&instance.service_name) {
            ids.remove(id);
            if ids.is_empty() {
                state.services.remove(&instance.service_name);
            }
        }
        let key = (instance.service_name.clone(), instance.endpoint.clone());
        if state.endpoints.get(&key).map(String::as_str) == Some(id) {
            state.endpoints.remove(&key);
        }

        if !instance.metadata.is_empty() {
            self.metrics.metadata_instances.dec();
        }
        if !instance.tags.is_empty() {
            self.metrics.tags_instances.dec();
        }
        self.metrics.instances.dec();
        Some(stored)
    }
}

#[cfg(test)]
impl InMemoryCatalog {
    /// Drops `id` from the instance map only, leaving the indexes dangling
    pub(super) fn forget_instance_record(
        &self,
        id: &str,
    ) {
        self.state.write().instances.remove(id);
    }
}

fn validate(instance: &ServiceInstance) -> StoreResult<()> {
    if instance.service_name.is_empty() {
        return Err(StoreError::bad_request("service name is required"));
    }
    if instance.service_name.len() > MAX_SERVICE_NAME_LENGTH {
        return Err(StoreError::bad_request("service name length exceeds the limit"));
    }
    if instance.endpoint.value.is_empty() {
        return Err(StoreError::bad_request("endpoint value is required"));
    }
    if instance.endpoint.value.len() > MAX_ENDPOINT_VALUE_LENGTH {
        return Err(StoreError::bad_request("endpoint value length exceeds the limit"));
    }
    if instance.metadata.len() > MAX_METADATA_LENGTH {
        return Err(StoreError::bad_request("metadata length exceeds the limit"));
    }
    Ok(())
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn register(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        self.register_instance(instance)
    }

    async fn register_replica(
        &self,
        instance: ServiceInstance,
    ) -> StoreResult<ServiceInstance> {
        self.register_replica_instance(instance)
    }

    async fn deregister(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        self.deregister_instance(instance_id)
    }

    async fn renew(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        self.renew_instance(instance_id)
    }

    async fn set_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
    ) -> StoreResult<ServiceInstance> {
        self.set_instance_status(instance_id, status)
    }

    async fn instance(
        &self,
        instance_id: &str,
    ) -> StoreResult<ServiceInstance> {
        self.get_instance(instance_id)
    }

    async fn list(
        &self,
        service_name: &str,
        predicate: Option<Predicate>,
    ) -> StoreResult<Vec<ServiceInstance>> {
        self.list_instances(service_name, predicate.as_ref())
    }

    async fn list_services(
        &self,
        predicate: Option<Predicate>,
    ) -> Vec<Service> {
        self.list_service_names(predicate.as_ref())
    }

    fn sweep_expired(&self) -> usize {
        self.sweep()
    }
}
