use d_registry::Endpoint;
use d_registry::ServiceInstance;
use d_registry::READ_REPAIR_REQUESTS;

use crate::common::eventually;
use crate::common::member;
use crate::common::TestMember;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_renew_of_unknown_instance_is_repaired() {
    let a = TestMember::start(17231, &[17232]).await;
    let catalog_a = a.catalog();
    let registered = catalog_a
        .register(ServiceInstance::new("inventory", Endpoint::new("http", "10.0.2.1:80")))
        .await
        .unwrap();

    // b knows no peer at startup and therefore skips the initial sync
    let b = TestMember::start(17232, &[]).await;
    let catalog_b = b.catalog();
    assert!(catalog_b.instance(&registered.id).await.is_err());
    b.membership.add(member(17231));

    let repaired = eventually(|| {
        let (catalog_a, catalog_b) = (catalog_a.clone(), catalog_b.clone());
        let id = registered.id.clone();
        async move {
            catalog_a.renew(&id).await.unwrap();
            catalog_b.instance(&id).await.is_ok()
        }
    })
    .await;
    assert!(repaired, "renew did not trigger a read repair");

    let replica = catalog_b.instance(&registered.id).await.unwrap();
    assert_eq!(replica.service_name, "inventory");
    assert_eq!(replica.registration_time, registered.registration_time);
    assert!(READ_REPAIR_REQUESTS.get() >= 1);

    a.stop().await;
    b.stop().await;
}
