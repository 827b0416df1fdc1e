use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::Error;
use crate::MemberId;
use crate::Namespace;
use crate::ReplicationError;

fn new_replicator(
    capacity: usize,
) -> (
    NamespaceReplicator,
    mpsc::Receiver<OutMessage>,
    mpsc::Receiver<OutMessage>,
    CancellationToken,
) {
    let (broadcast_tx, broadcast_rx) = mpsc::channel(capacity);
    let (repair_tx, repair_rx) = mpsc::channel(capacity);
    let done = CancellationToken::new();
    (
        NamespaceReplicator {
            namespace: Namespace::from("ns"),
            broadcast_tx,
            repair_tx,
            send_timeout: Duration::from_millis(20),
            done: done.clone(),
        },
        broadcast_rx,
        repair_rx,
        done,
    )
}

#[tokio::test]
async fn test_broadcast_and_send_use_separate_queues() {
    let (replicator, mut broadcast_rx, mut repair_rx, _done) = new_replicator(4);

    replicator.broadcast(Bytes::from_static(b"b")).await.unwrap();
    replicator
        .send(MemberId::new("10.0.0.1:6100"), Bytes::from_static(b"r"))
        .await
        .unwrap();

    let broadcast = broadcast_rx.recv().await.unwrap();
    assert_eq!(broadcast.target, None);
    assert_eq!(broadcast.namespace, Namespace::from("ns"));

    let repair = repair_rx.recv().await.unwrap();
    assert_eq!(repair.target, Some(MemberId::new("10.0.0.1:6100")));
    assert_eq!(repair.data, Bytes::from_static(b"r"));
}

#[tokio::test]
async fn test_full_queue_times_out() {
    let (replicator, _broadcast_rx, _repair_rx, _done) = new_replicator(1);
    replicator.broadcast(Bytes::from_static(b"1")).await.unwrap();

    let result = replicator.broadcast(Bytes::from_static(b"2")).await;
    assert!(matches!(
        result,
        Err(Error::Replication(ReplicationError::SendTimeout { .. }))
    ));
}

#[tokio::test]
async fn test_stopped_replicator_refuses_to_send() {
    let (replicator, _broadcast_rx, _repair_rx, done) = new_replicator(4);
    done.cancel();

    assert!(matches!(
        replicator.broadcast(Bytes::new()).await,
        Err(Error::Replication(ReplicationError::Stopped))
    ));
    assert!(matches!(
        replicator.send(MemberId::new("x:1"), Bytes::new()).await,
        Err(Error::Replication(ReplicationError::Stopped))
    ));
}
