//! Cluster steward
//!
//! The control plane of the cluster: owns the topology store, serves the
//! admin HTTP API, tracks instance liveness, and (when enabled) drives
//! automatic master failover.

pub mod api;
pub mod failover;
pub mod node_manager;
pub mod storage;
pub mod topology;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::failover::{FailoverConfig, FailoverController};
use crate::node_manager::{NodeManager, NodeManagerConfig};
use crate::storage::{FileStorage, StorageError};
use crate::topology::ClusterTopology;
use crate::watch::RoutingWatcher;

/// Steward configuration
#[derive(Debug, Clone)]
pub struct StewardConfig {
    /// Cluster name, used when bootstrapping a fresh data directory
    pub cluster_name: String,
    /// Data directory for topology persistence
    pub data_dir: String,
    /// Admin API bind address
    pub http_addr: String,
    /// Heartbeat timeout (seconds)
    pub heartbeat_timeout_secs: i64,
    /// Heartbeat check interval (seconds)
    pub heartbeat_check_interval_secs: u64,
    /// Failover probe settings
    pub failover: FailoverConfig,
    /// How long a routing watch request is held open (seconds)
    pub watch_hold_secs: u64,
    /// Periodic persistence interval (seconds)
    pub save_interval_secs: u64,
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            cluster_name: "switchboard".to_string(),
            data_dir: "./data".to_string(),
            http_addr: "127.0.0.1:8080".to_string(),
            heartbeat_timeout_secs: 30,
            heartbeat_check_interval_secs: 10,
            failover: FailoverConfig::default(),
            watch_hold_secs: 25,
            save_interval_secs: 30,
        }
    }
}

/// The steward service
pub struct Steward {
    config: StewardConfig,
    topology: Arc<RwLock<ClusterTopology>>,
    storage: FileStorage,
    watcher: RoutingWatcher,
    node_manager: Arc<NodeManager>,
    failover: Arc<FailoverController>,
}

impl Steward {
    /// Load (or bootstrap) the topology and wire up the components
    pub async fn new(config: StewardConfig) -> Result<Self, StorageError> {
        let storage = FileStorage::new(&config.data_dir);
        let topology = storage.load_or_create(&config.cluster_name).await?;
        info!(
            "Steward for cluster '{}' starting, routing version {}",
            topology.name, topology.routing.version
        );
        let topology = Arc::new(RwLock::new(topology));
        let watcher = RoutingWatcher::new();

        let node_manager = Arc::new(NodeManager::new(
            NodeManagerConfig {
                heartbeat_timeout_secs: config.heartbeat_timeout_secs,
                check_interval_secs: config.heartbeat_check_interval_secs,
            },
            topology.clone(),
        ));
        let failover = Arc::new(FailoverController::new(
            config.failover.clone(),
            topology.clone(),
            watcher.clone(),
        ));

        Ok(Self {
            config,
            topology,
            storage,
            watcher,
            node_manager,
            failover,
        })
    }

    pub fn config(&self) -> &StewardConfig {
        &self.config
    }

    pub fn topology(&self) -> &Arc<RwLock<ClusterTopology>> {
        &self.topology
    }

    pub fn watcher(&self) -> &RoutingWatcher {
        &self.watcher
    }

    pub fn node_manager(&self) -> &NodeManager {
        &self.node_manager
    }

    pub fn failover(&self) -> &FailoverController {
        &self.failover
    }

    /// Persist the topology; failures are logged, not propagated, so a full
    /// disk never takes the control plane down with it.
    pub async fn persist(&self) {
        let snapshot = self.topology.read().await.clone();
        if let Err(e) = self.storage.save(&snapshot).await {
            error!("Failed to persist topology: {}", e);
        }
    }

    /// Spawn the liveness checker, failover probe loop, and periodic save
    pub fn start_background_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        handles.push(self.node_manager.clone().start_heartbeat_checker());
        handles.push(self.failover.clone().start());

        let steward = self.clone();
        let save_interval = Duration::from_secs(self.config.save_interval_secs);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(save_interval);
            loop {
                ticker.tick().await;
                steward.persist().await;
            }
        }));
        handles
    }
}
