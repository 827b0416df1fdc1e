use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;
use crate::CatalogConfig;
use crate::InMessage;
use crate::MemberId;
use crate::MockReplicator;
use crate::Namespace;
use crate::OutMessage;
use crate::Replication;
use crate::ReplicationConfig;
use crate::Replicator;
use crate::StoreMetrics;
use crate::SyncRequest;

fn test_config() -> CatalogConfig {
    CatalogConfig {
        default_ttl_ms: 60,
        minimum_ttl_ms: 60,
        maximum_ttl_ms: 60_000,
        sync_wait_ms: 50,
        sweep_interval_ms: 20,
        ..CatalogConfig::default()
    }
}

#[tokio::test]
async fn test_catalogs_are_created_once_per_namespace() {
    let registry = RegistryBuilder::new(test_config())
        .metrics(Arc::new(StoreMetrics::detached()))
        .build()
        .await
        .unwrap();

    let a1 = registry.get_catalog(&Namespace::from("a")).unwrap();
    let a2 = registry.get_catalog(&Namespace::from("a")).unwrap();
    let b = registry.get_catalog(&Namespace::from("b")).unwrap();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b));
    assert_eq!(registry.namespaces(), vec![Namespace::from("a"), Namespace::from("b")]);
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let registry = RegistryBuilder::new(test_config())
        .metrics(Arc::new(StoreMetrics::detached()))
        .build()
        .await
        .unwrap();

    let a = registry.get_catalog(&Namespace::from("a")).unwrap();
    let b = registry.get_catalog(&Namespace::from("b")).unwrap();
    let registered = a
        .register(ServiceInstance::new("orders", Endpoint::new("tcp", "h:1")))
        .await
        .unwrap();

    assert!(b.instance(&registered.id).await.is_err());
    assert!(b.list_services(None).await.is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let result = RegistryBuilder::new(CatalogConfig {
        minimum_ttl_ms: 10_000,
        maximum_ttl_ms: 1_000,
        ..CatalogConfig::default()
    })
    .build()
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_sweeper_evicts_unread_namespaces() {
    let metrics = Arc::new(StoreMetrics::detached());
    let registry = RegistryBuilder::new(test_config())
        .metrics(metrics.clone())
        .build()
        .await
        .unwrap();

    let catalog = registry.get_catalog(&Namespace::from("a")).unwrap();
    catalog
        .register(ServiceInstance::new("orders", Endpoint::new("tcp", "h:1")))
        .await
        .unwrap();

    timeout(Duration::from_secs(2), async {
        while metrics.expirations.get() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(metrics.instances.get(), 0);
}

/// Transport double: sync and notification traffic is injected by the test
struct FakeReplication {
    sync_messages: Mutex<Option<Vec<InMessage>>>,
    notifications: Mutex<Option<mpsc::Receiver<InMessage>>>,
    sync_requests: Mutex<Option<mpsc::Receiver<SyncRequest>>>,
}

#[async_trait]
impl Replication for FakeReplication {
    fn get_replicator(
        &self,
        _namespace: &Namespace,
    ) -> crate::Result<Arc<dyn Replicator>> {
        let mut replicator = MockReplicator::new();
        replicator.expect_broadcast().returning(|_| Ok(()));
        replicator.expect_send().returning(|_, _| Ok(()));
        Ok(Arc::new(replicator))
    }

    fn notifications(&self) -> Option<mpsc::Receiver<InMessage>> {
        self.notifications.lock().take()
    }

    fn sync(
        &self,
        _wait: Duration,
    ) -> mpsc::Receiver<InMessage> {
        let messages = self.sync_messages.lock().take().unwrap_or_default();
        let (tx, rx) = mpsc::channel(messages.len().max(1));
        for message in messages {
            tx.try_send(message).unwrap();
        }
        rx
    }

    fn sync_requests(&self) -> Option<mpsc::Receiver<SyncRequest>> {
        self.sync_requests.lock().take()
    }

    async fn stop(&self) {}
}

fn register_message(
    namespace: &str,
    endpoint: &str,
) -> InMessage {
    let mut instance = ServiceInstance::new("orders", Endpoint::new("tcp", endpoint));
    instance.id = compute_instance_id("orders", &instance.endpoint);
    instance.registration_time = Some(std::time::SystemTime::now());
    InMessage {
        member_id: MemberId::new("10.0.0.9:6100"),
        namespace: Namespace::from(namespace),
        data: CatalogMutation::Register(instance).encode().unwrap(),
    }
}

#[tokio::test]
async fn test_replication_handler_routes_sync_notifications_and_requests() {
    let (notify_tx, notify_rx) = mpsc::channel(8);
    let (request_tx, request_rx) = mpsc::channel(8);
    let replication = Arc::new(FakeReplication {
        sync_messages: Mutex::new(Some(vec![register_message("a", "h:1"), register_message("b", "h:2")])),
        notifications: Mutex::new(Some(notify_rx)),
        sync_requests: Mutex::new(Some(request_rx)),
    });

    let config = CatalogConfig {
        default_ttl_ms: 30_000,
        minimum_ttl_ms: 1_000,
        ..test_config()
    };
    let registry = RegistryBuilder::new(config)
        .replication(replication, ReplicationConfig::default())
        .metrics(Arc::new(StoreMetrics::detached()))
        .build()
        .await
        .unwrap();

    // synced namespaces are created on demand
    let a = registry.get_catalog(&Namespace::from("a")).unwrap();
    let b = registry.get_catalog(&Namespace::from("b")).unwrap();
    timeout(Duration::from_secs(2), async {
        while a.list("orders", None).await.is_err() || b.list("orders", None).await.is_err() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // live notifications
    notify_tx.send(register_message("a", "h:3")).await.unwrap();
    timeout(Duration::from_secs(2), async {
        while a.list("orders", None).await.map(|l| l.len()).unwrap_or(0) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // sync request of a joining peer covers every namespace
    let (out_tx, mut out_rx) = mpsc::channel::<OutMessage>(16);
    request_tx.send(out_tx).await.unwrap();
    let mut exported = Vec::new();
    while let Some(message) = timeout(Duration::from_secs(2), out_rx.recv()).await.unwrap() {
        exported.push(message.namespace);
    }
    exported.sort();
    assert_eq!(
        exported,
        vec![Namespace::from("a"), Namespace::from("a"), Namespace::from("b")]
    );
}
