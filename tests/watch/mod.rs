use std::time::Duration;

use etcd_watch_client::Error;
use etcd_watch_client::WatchUpdate;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::common::client_for;
use crate::common::enable_logger;
use crate::common::FakeEtcd;
use crate::common::FakeFollower;

const WAIT: Duration = Duration::from_secs(5);

async fn next_batch(rx: &mut mpsc::UnboundedReceiver<Vec<WatchUpdate>>) -> Vec<WatchUpdate> {
    timeout(WAIT, rx.recv())
        .await
        .expect("batch should arrive in time")
        .expect("watch should still be running")
}

#[tokio::test]
async fn test_directory_watch_sees_snapshot_then_changes_in_order() {
    enable_logger();
    let etcd = FakeEtcd::start().await;
    let client = client_for(etcd.port());
    client.force_set("/cfg/a", "1").await.unwrap();

    let shutdown = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client.spawn_watch("/cfg/", &shutdown, move |updates| {
        let _ = tx.send(updates);
    });

    let snapshot = next_batch(&mut rx).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].node.key, "/cfg/a");
    assert!(snapshot[0].exists);

    let writer = client.clone();
    let b = writer.create("/cfg/b", "2").await.unwrap();
    let a = writer.force_set("/cfg/a", "3").await.unwrap();
    writer.delete("/cfg/b", b).await.unwrap();

    let first = next_batch(&mut rx).await;
    assert_eq!(first[0].node.key, "/cfg/b");
    assert_eq!(first[0].node.modified_index, b);

    let second = next_batch(&mut rx).await;
    assert_eq!(second[0].node.value, "3");
    assert_eq!(second[0].node.modified_index, a);

    let third = next_batch(&mut rx).await;
    assert_eq!(third[0].node.key, "/cfg/b");
    assert!(!third[0].exists);

    shutdown.cancel();
    let status = timeout(WAIT, handle.wait()).await.expect("watch should stop");
    assert!(matches!(status, Error::Cancelled));
}

#[tokio::test]
async fn test_single_key_watch_ignores_siblings() {
    enable_logger();
    let etcd = FakeEtcd::start().await;
    let client = client_for(etcd.port());
    client.force_set("/k", "v0").await.unwrap();

    let shutdown = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client.spawn_watch("/k", &shutdown, move |updates| {
        let _ = tx.send(updates);
    });
    assert_eq!(next_batch(&mut rx).await[0].node.value, "v0");

    client.force_set("/other", "x").await.unwrap();
    client.force_set("/k", "v1").await.unwrap();

    let update = next_batch(&mut rx).await;
    assert_eq!(update[0].node.key, "/k");
    assert_eq!(update[0].node.value, "v1");

    handle.cancel();
    let status = timeout(WAIT, handle.wait()).await.expect("watch should stop");
    assert!(matches!(status, Error::Cancelled));
}

#[tokio::test]
async fn test_watch_survives_idle_poll_timeouts() {
    enable_logger();
    let etcd = FakeEtcd::start().await;
    let client = client_for(etcd.port());
    client.force_set("/idle", "0").await.unwrap();

    let shutdown = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client.spawn_watch("/idle", &shutdown, move |updates| {
        let _ = tx.send(updates);
    });
    next_batch(&mut rx).await;

    // longer than the 500ms call timeout: at least one poll expires
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(!handle.is_finished());

    client.force_set("/idle", "1").await.unwrap();
    assert_eq!(next_batch(&mut rx).await[0].node.value, "1");

    shutdown.cancel();
    timeout(WAIT, handle.wait()).await.expect("watch should stop");
}

#[tokio::test]
async fn test_watch_through_follower() {
    enable_logger();
    let leader = FakeEtcd::start().await;
    let follower = FakeFollower::start(leader.addr).await;
    let client = client_for(follower.port());
    client.force_set("/f", "0").await.unwrap();

    let shutdown = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = client.spawn_watch("/f", &shutdown, move |updates| {
        let _ = tx.send(updates);
    });
    next_batch(&mut rx).await;

    client.force_set("/f", "1").await.unwrap();
    assert_eq!(next_batch(&mut rx).await[0].node.value, "1");
    assert_eq!(follower.hits(), 1);

    shutdown.cancel();
    timeout(WAIT, handle.wait()).await.expect("watch should stop");
}

#[tokio::test]
async fn test_watch_on_missing_key_fails_initial_read() {
    enable_logger();
    let etcd = FakeEtcd::start().await;
    let client = client_for(etcd.port());

    let status = timeout(WAIT, client.watch("/nope", CancellationToken::new(), |_| {}))
        .await
        .expect("watch should stop");

    assert!(status.is_fatal());
    assert!(matches!(status, Error::InitialRead { .. }));
}
