use std::future::Future;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use d_registry::Catalog;
use d_registry::CatalogConfig;
use d_registry::Member;
use d_registry::Namespace;
use d_registry::Registry;
use d_registry::RegistryBuilder;
use d_registry::Replication;
use d_registry::ReplicationConfig;
use d_registry::ReplicationServer;
use d_registry::StaticMembership;
use d_registry::StoreMetrics;
use tokio::time;

pub const WAIT_FOR_CONVERGENCE: Duration = Duration::from_secs(10);

pub const NAMESPACE: &str = "tenant-a";

pub fn member(port: u16) -> Member {
    Member::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

pub fn catalog_config() -> CatalogConfig {
    CatalogConfig {
        default_ttl_ms: 30_000,
        minimum_ttl_ms: 100,
        maximum_ttl_ms: 60_000,
        sync_wait_ms: 500,
        sweep_interval_ms: 100,
        ..CatalogConfig::default()
    }
}

pub fn replication_config() -> ReplicationConfig {
    ReplicationConfig {
        enabled: true,
        send_timeout_ms: 500,
        flush_interval_ms: 10,
        reconnect_base_delay_ms: 50,
        reconnect_max_delay_ms: 200,
        sync_poll_interval_ms: 50,
        disconnected_threshold_ms: 100,
        ..ReplicationConfig::default()
    }
}

/// One registry process running in the test runtime
pub struct TestMember {
    pub member: Member,
    pub membership: Arc<StaticMembership>,
    pub server: Arc<ReplicationServer>,
    pub registry: Arc<Registry>,
}

impl TestMember {
    pub async fn start(
        port: u16,
        peers: &[u16],
    ) -> TestMember {
        Self::start_with(port, peers, replication_config()).await
    }

    pub async fn start_with(
        port: u16,
        peers: &[u16],
        config: ReplicationConfig,
    ) -> TestMember {
        let self_member = member(port);
        let membership = StaticMembership::with_members(peers.iter().map(|p| member(*p)).collect());
        let registrator = membership.registrator(self_member.clone());

        let server = Arc::new(
            ReplicationServer::new(config.clone(), membership.clone(), registrator)
                .await
                .expect("replication server should bind"),
        );
        let registry = RegistryBuilder::new(catalog_config())
            .replication(server.clone(), config)
            .metrics(Arc::new(StoreMetrics::detached()))
            .build()
            .await
            .expect("registry should build");

        TestMember {
            member: self_member,
            membership,
            server,
            registry,
        }
    }

    pub fn catalog(&self) -> Arc<dyn Catalog> {
        self.registry
            .get_catalog(&Namespace::from(NAMESPACE))
            .expect("catalog should be created")
    }

    pub async fn stop(&self) {
        self.server.stop().await;
    }
}

/// Polls `condition` until it holds or the convergence timeout elapses
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    time::timeout(WAIT_FOR_CONVERGENCE, async {
        loop {
            if condition().await {
                return;
            }
            time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .is_ok()
}
