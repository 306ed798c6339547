//! Instance liveness bookkeeping
//!
//! Tracks heartbeats and flips instances offline when they stop arriving.
//! Promotion decisions belong to the failover controller; this module only
//! maintains status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::topology::ClusterTopology;

/// Liveness configuration
#[derive(Debug, Clone)]
pub struct NodeManagerConfig {
    /// Heartbeat timeout (seconds)
    pub heartbeat_timeout_secs: i64,
    /// Check interval (seconds)
    pub check_interval_secs: u64,
}

impl Default for NodeManagerConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 30,
            check_interval_secs: 10,
        }
    }
}

/// Instance liveness manager
pub struct NodeManager {
    config: NodeManagerConfig,
    topology: Arc<RwLock<ClusterTopology>>,
}

impl NodeManager {
    pub fn new(config: NodeManagerConfig, topology: Arc<RwLock<ClusterTopology>>) -> Self {
        Self { config, topology }
    }

    /// Record a heartbeat. Returns false for unknown instances.
    pub async fn heartbeat(&self, instance_uuid: &Uuid) -> bool {
        let mut topology = self.topology.write().await;
        let known = topology.heartbeat(instance_uuid);
        if known {
            debug!("Heartbeat from instance {}", instance_uuid);
        } else {
            warn!("Heartbeat from unknown instance {}", instance_uuid);
        }
        known
    }

    /// Spawn the heartbeat timeout checker
    pub fn start_heartbeat_checker(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let check_interval = Duration::from_secs(self.config.check_interval_secs);
        tokio::spawn(async move {
            let mut ticker = interval(check_interval);
            loop {
                ticker.tick().await;
                self.check_heartbeats().await;
            }
        })
    }

    async fn check_heartbeats(&self) {
        let timeout_secs = self.config.heartbeat_timeout_secs;
        let mut topology = self.topology.write().await;

        let timed_out: Vec<Uuid> = topology
            .instances
            .values()
            .filter(|n| n.is_online() && n.is_heartbeat_timeout(timeout_secs))
            .map(|n| n.instance_uuid)
            .collect();

        for instance_uuid in timed_out {
            warn!(
                "Instance {} heartbeat timed out, marking offline",
                instance_uuid
            );
            topology.mark_offline(&instance_uuid);
        }
    }
}
