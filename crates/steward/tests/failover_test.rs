//! Switchover and automatic failover against a live in-process cluster

mod common;

use std::time::Duration;

use common::test_cluster::TestCluster;
use sb_core::{wait_until, RetryPolicy};
use uuid::Uuid;

fn policy() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(100), Duration::from_secs(15))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_switchover_follows_explicit_master() {
    let mut cluster = TestCluster::start().await;
    let rs = Uuid::new_v4();
    let n1 = cluster.add_storage_node(rs).await;
    let n2 = cluster.add_storage_node(rs).await;
    cluster.refresh_router().await;

    let cluster_ref = &cluster;
    let first = n1.instance_uuid;
    let second = n2.instance_uuid;

    // Writes land on the bootstrap master
    wait_until(policy(), move || async move {
        (cluster_ref.current_master_via_router().await? == first).then_some(())
    })
    .await
    .expect("writes should reach the first master");

    // Operator moves the master; failover stays off throughout
    assert!(!cluster.get_failover().await);
    cluster
        .set_master(rs, second)
        .await
        .expect("switchover should succeed");

    // The router picks up the new table and writes follow the new master
    wait_until(policy(), move || async move {
        (cluster_ref.current_master_via_router().await? == second).then_some(())
    })
    .await
    .expect("writes should follow the switchover");

    assert_eq!(cluster.get_master(rs).await, Some(second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failover_promotes_surviving_replica() {
    let mut cluster = TestCluster::start().await;
    let rs = Uuid::new_v4();
    let n1 = cluster.add_storage_node(rs).await;
    let n2 = cluster.add_storage_node(rs).await;
    cluster.refresh_router().await;

    assert!(cluster.set_failover(true).await);
    assert_eq!(cluster.get_master(rs).await, Some(n1.instance_uuid));

    n1.kill();

    let cluster_ref = &cluster;
    let survivor = n2.instance_uuid;

    // The probe notices the dead master and promotes the survivor
    wait_until(policy(), move || async move {
        (cluster_ref.get_master(rs).await? == survivor).then_some(())
    })
    .await
    .expect("survivor should be promoted");

    // Writes converge on the survivor
    wait_until(policy(), move || async move {
        (cluster_ref.current_master_via_router().await? == survivor).then_some(())
    })
    .await
    .expect("writes should reach the promoted master");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_promotion_while_failover_disabled() {
    let mut cluster = TestCluster::start().await;
    let rs = Uuid::new_v4();
    let n1 = cluster.add_storage_node(rs).await;
    let _n2 = cluster.add_storage_node(rs).await;

    assert!(!cluster.get_failover().await);
    n1.kill();

    // Give the probe loop ample time; the master pointer must not move
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cluster.get_master(rs).await, Some(n1.instance_uuid));
}
