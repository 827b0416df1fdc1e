use d_registry::Endpoint;
use d_registry::InstanceStatus;
use d_registry::ServiceInstance;
use d_registry::StoreError;

use crate::common::eventually;
use crate::common::TestMember;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutations_propagate_between_two_members() {
    let (a, b) = tokio::join!(TestMember::start(17201, &[17202]), TestMember::start(17202, &[17201]));
    let (catalog_a, catalog_b) = (a.catalog(), b.catalog());

    // Broadcasts sent before the peer streams connect are lost; registering
    // again is idempotent
    let instance = ServiceInstance::new("orders", Endpoint::new("tcp", "10.0.0.1:8080")).with_tags(["blue"]);
    let registered = catalog_a.register(instance.clone()).await.unwrap();
    let converged = eventually(|| {
        let (catalog_a, catalog_b, instance) = (catalog_a.clone(), catalog_b.clone(), instance.clone());
        async move {
            catalog_a.register(instance).await.unwrap();
            catalog_b.list("orders", None).await.is_ok()
        }
    })
    .await;
    assert!(converged, "register did not reach member b");

    let replica = catalog_b.instance(&registered.id).await.unwrap();
    assert_eq!(replica.id, registered.id);
    assert!(replica.has_tag("blue"));
    assert_eq!(replica.registration_time, registered.registration_time);

    catalog_a
        .set_status(&registered.id, InstanceStatus::OutOfService)
        .await
        .unwrap();
    let converged = eventually(|| {
        let catalog_b = catalog_b.clone();
        let id = registered.id.clone();
        async move {
            catalog_b
                .instance(&id)
                .await
                .map(|i| i.status == InstanceStatus::OutOfService)
                .unwrap_or(false)
        }
    })
    .await;
    assert!(converged, "status change did not reach member b");

    catalog_a.deregister(&registered.id).await.unwrap();
    let converged = eventually(|| {
        let catalog_b = catalog_b.clone();
        let id = registered.id.clone();
        async move {
            matches!(
                catalog_b.instance(&id).await,
                Err(StoreError::NoSuchServiceInstance { .. })
            )
        }
    })
    .await;
    assert!(converged, "deregister did not reach member b");

    a.stop().await;
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutations_on_either_side_converge() {
    let (a, b) = tokio::join!(TestMember::start(17211, &[17212]), TestMember::start(17212, &[17211]));
    let (catalog_a, catalog_b) = (a.catalog(), b.catalog());

    let from_a = ServiceInstance::new("payments", Endpoint::new("tcp", "10.0.0.1:9000"));
    let from_b = ServiceInstance::new("payments", Endpoint::new("tcp", "10.0.0.2:9000"));

    let converged = eventually(|| {
        let (catalog_a, catalog_b) = (catalog_a.clone(), catalog_b.clone());
        let (from_a, from_b) = (from_a.clone(), from_b.clone());
        async move {
            catalog_a.register(from_a).await.unwrap();
            catalog_b.register(from_b).await.unwrap();
            let on_a = catalog_a.list("payments", None).await.map(|l| l.len()).unwrap_or(0);
            let on_b = catalog_b.list("payments", None).await.map(|l| l.len()).unwrap_or(0);
            on_a == 2 && on_b == 2
        }
    })
    .await;
    assert!(converged, "members did not converge on both instances");

    a.stop().await;
    b.stop().await;
}
