//! Automatic failover controller
//!
//! When enabled, probes every replicaset master over the wire protocol and
//! promotes a surviving replica when a master stops answering. All master
//! mutations go through the topology write lock, and the failed master is
//! re-checked under that lock before promoting, so concurrent detections of
//! the same failure collapse into one promotion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wire::WireClient;

use crate::topology::ClusterTopology;
use crate::watch::RoutingWatcher;

/// Failover controller configuration
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    /// Probe interval (milliseconds)
    pub probe_interval_ms: u64,
    /// Per-probe deadline (milliseconds)
    pub probe_timeout_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 1000,
            probe_timeout_ms: 500,
        }
    }
}

impl FailoverConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Failover controller
pub struct FailoverController {
    config: FailoverConfig,
    topology: Arc<RwLock<ClusterTopology>>,
    watcher: RoutingWatcher,
}

impl FailoverController {
    pub fn new(
        config: FailoverConfig,
        topology: Arc<RwLock<ClusterTopology>>,
        watcher: RoutingWatcher,
    ) -> Self {
        Self {
            config,
            topology,
            watcher,
        }
    }

    /// Whether automatic failover is enabled
    pub async fn get_enabled(&self) -> bool {
        self.topology.read().await.failover
    }

    /// Toggle automatic failover, returning the new value
    pub async fn set_enabled(&self, enabled: bool) -> bool {
        let mut topology = self.topology.write().await;
        topology.failover = enabled;
        info!(
            "Automatic failover {}",
            if enabled { "enabled" } else { "disabled" }
        );
        enabled
    }

    /// Spawn the probe loop
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let probe_interval = self.config.probe_interval();
        tokio::spawn(async move {
            let mut ticker = interval(probe_interval);
            loop {
                ticker.tick().await;
                if self.get_enabled().await {
                    self.probe_masters().await;
                }
            }
        })
    }

    /// Probe every master once; promote for those that fail.
    async fn probe_masters(&self) {
        // Snapshot targets without holding the lock across network I/O
        let targets: Vec<(Uuid, Uuid, Option<String>)> = {
            let topology = self.topology.read().await;
            topology
                .replicasets
                .values()
                .filter_map(|rs| {
                    let master = rs.master?;
                    let addr = topology.routing.node_addrs.get(&master).cloned();
                    Some((rs.uuid, master, addr))
                })
                .collect()
        };

        for (replicaset_uuid, master_uuid, addr) in targets {
            let reachable = match addr {
                Some(addr) => self.probe(&addr).await,
                // No known address counts as unreachable
                None => false,
            };

            if reachable {
                debug!("Master {} of {} is alive", master_uuid, replicaset_uuid);
            } else {
                warn!(
                    "Master {} of replicaset {} is unreachable",
                    master_uuid, replicaset_uuid
                );
                self.promote_replacement(replicaset_uuid, master_uuid).await;
            }
        }
    }

    async fn probe(&self, addr: &str) -> bool {
        let timeout = self.config.probe_timeout();
        match WireClient::connect(addr, timeout).await {
            Ok(mut client) => client.ping(timeout).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Promote a surviving replica in place of `failed_master`.
    ///
    /// Re-validates under the write lock that the failed instance still holds
    /// the master pointer; a concurrent admin reassignment or an earlier
    /// promotion makes this a no-op.
    async fn promote_replacement(&self, replicaset_uuid: Uuid, failed_master: Uuid) {
        let new_version = {
            let mut topology = self.topology.write().await;

            match topology.get_master(&replicaset_uuid) {
                Ok(current) if current == failed_master => {}
                _ => return,
            }

            topology.mark_offline(&failed_master);

            let replacement = match select_replacement(&topology, &replicaset_uuid, &failed_master)
            {
                Some(uuid) => uuid,
                None => {
                    warn!(
                        "No live replica available to replace master {} in replicaset {}",
                        failed_master, replicaset_uuid
                    );
                    return;
                }
            };

            // Membership was just checked, so this cannot fail
            if let Err(e) = topology.set_master(replicaset_uuid, replacement) {
                warn!(
                    "Promotion of {} in replicaset {} failed: {}",
                    replacement, replicaset_uuid, e
                );
                return;
            }

            info!(
                "Promoted {} to master of replicaset {} (was {})",
                replacement, replicaset_uuid, failed_master
            );
            topology.routing.version
        };

        self.watcher.notify_version(new_version).await;
    }
}

/// Deterministic replacement choice: the lowest-UUID online member that is
/// not the failed master.
fn select_replacement(
    topology: &ClusterTopology,
    replicaset_uuid: &Uuid,
    failed_master: &Uuid,
) -> Option<Uuid> {
    topology
        .online_members(replicaset_uuid)
        .into_iter()
        .find(|m| m != failed_master)
}
