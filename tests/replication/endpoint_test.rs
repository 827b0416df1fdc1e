use std::io::Read;

use d_registry::Endpoint;
use d_registry::Error;
use d_registry::HealthStatus;
use d_registry::Namespace;
use d_registry::NetworkError;
use d_registry::Replication;
use d_registry::ReplicationError;
use d_registry::ReplicationServer;
use d_registry::ServiceInstance;
use d_registry::StaticMembership;

use crate::common::eventually;
use crate::common::member;
use crate::common::replication_config;
use crate::common::TestMember;
use crate::common::NAMESPACE;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_streams_require_a_foreign_member_id() {
    let a = TestMember::start(17241, &[]).await;
    let http = reqwest::Client::new();

    let response = http
        .get(a.member.url("v1/replication"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = http
        .get(a.member.url("v1/sync"))
        .header("Member-ID", a.member.id.as_str())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    a.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sync_endpoint_streams_registered_instances() {
    let a = TestMember::start(17245, &[]).await;
    a.catalog()
        .register(ServiceInstance::new("orders", Endpoint::new("tcp", "10.0.3.1:80")))
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .get(a.member.url("v1/sync"))
        .header("Member-ID", "127.0.0.1:9")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    // The stream ends once every namespace has been exported
    let body = response.text().await.unwrap();
    assert!(body.contains("id: 0\n"));
    assert!(body.contains("event: SYNC\n"));
    assert!(body.contains(&format!("\"namespace\":\"{NAMESPACE}\"")));

    a.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sync_stream_is_gzip_encoded_on_request() {
    let a = TestMember::start(17247, &[]).await;
    a.catalog()
        .register(ServiceInstance::new("billing", Endpoint::new("tcp", "10.0.3.2:80")))
        .await
        .unwrap();

    // decompression stays manual so the raw encoding is observable
    let http = reqwest::Client::builder().no_gzip().build().unwrap();
    let response = http
        .get(a.member.url("v1/sync"))
        .header("Member-ID", "127.0.0.1:9")
        .header("Accept-Encoding", "gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers().get("content-encoding").unwrap(), "gzip");

    let compressed = response.bytes().await.unwrap();
    let mut body = String::new();
    flate2::read::GzDecoder::new(&compressed[..])
        .read_to_string(&mut body)
        .unwrap();
    assert!(body.contains("id: 0\n"));
    assert!(body.contains("event: SYNC\n"));
    assert!(body.contains(&format!("\"namespace\":\"{NAMESPACE}\"")));

    a.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_plain_stream_without_accept_encoding() {
    let a = TestMember::start(17248, &[]).await;
    a.catalog()
        .register(ServiceInstance::new("billing", Endpoint::new("tcp", "10.0.3.3:80")))
        .await
        .unwrap();

    let http = reqwest::Client::builder().no_gzip().build().unwrap();
    let response = http
        .get(a.member.url("v1/sync"))
        .header("Member-ID", "127.0.0.1:9")
        .send()
        .await
        .unwrap();
    assert!(response.headers().get("content-encoding").is_none());
    assert!(response.text().await.unwrap().contains("event: SYNC\n"));

    a.stop().await;
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let _occupied = std::net::TcpListener::bind("127.0.0.1:17242").unwrap();
    let membership = StaticMembership::new();
    let registrator = membership.registrator(member(17242));

    let result = ReplicationServer::new(replication_config(), membership, registrator).await;
    assert!(matches!(result, Err(Error::Network(NetworkError::Bind { .. }))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreachable_peer_turns_health_unhealthy() {
    let a = TestMember::start(17243, &[17244]).await;

    let unhealthy = eventually(|| {
        let health = a.server.health();
        async move { !health.is_healthy() }
    })
    .await;
    assert!(unhealthy);
    match a.server.health() {
        HealthStatus::Unhealthy { message } => {
            assert_eq!(message, "1/1 replication clients disconnected for at least 100ms")
        }
        other => panic!("unexpected health {other:?}"),
    }

    a.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replicator_is_created_once_per_namespace() {
    let a = TestMember::start(17246, &[]).await;
    let _ = a.catalog();

    let result = a.server.get_replicator(&Namespace::from(NAMESPACE));
    assert!(matches!(
        result,
        Err(Error::Replication(ReplicationError::ReplicatorExists(_)))
    ));
    assert!(a.server.get_replicator(&Namespace::from("other")).is_ok());

    a.stop().await;
}
