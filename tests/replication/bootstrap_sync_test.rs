use std::collections::HashSet;

use d_registry::Endpoint;
use d_registry::ServiceInstance;

use crate::common::eventually;
use crate::common::TestMember;

const INSTANCES: usize = 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_joining_member_pulls_full_state() {
    let a = TestMember::start(17221, &[17222]).await;
    let catalog_a = a.catalog();

    let mut ids = HashSet::new();
    for i in 0..INSTANCES {
        let instance = ServiceInstance::new(format!("svc-{}", i % 4), Endpoint::new("tcp", format!("10.0.1.{i}:80")));
        ids.insert(catalog_a.register(instance).await.unwrap().id);
    }

    // Every broadcast above happened before b existed
    let b = TestMember::start(17222, &[17221]).await;
    let catalog_b = b.catalog();

    let converged = eventually(|| {
        let catalog_b = catalog_b.clone();
        async move {
            let mut count = 0;
            for service in catalog_b.list_services(None).await {
                count += catalog_b.list(&service.service_name, None).await.map(|l| l.len()).unwrap_or(0);
            }
            count == INSTANCES
        }
    })
    .await;
    assert!(converged, "member b did not receive the full catalog");

    for id in &ids {
        assert!(catalog_b.instance(id).await.is_ok(), "missing instance {id}");
    }
    assert_eq!(catalog_b.list_services(None).await.len(), 4);

    a.stop().await;
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_member_without_peers_starts_after_sync_wait() {
    let started = std::time::Instant::now();
    let a = TestMember::start(17226, &[17227]).await;

    // Nobody answers on 17227, so startup waits out the sync window
    assert!(started.elapsed() >= std::time::Duration::from_millis(500));
    assert!(a.catalog().list_services(None).await.is_empty());

    a.stop().await;
}
