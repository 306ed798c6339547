//! File persistence for the cluster topology
//!
//! Writes the topology as JSON, via a temp file and an atomic rename.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::topology::ClusterTopology;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// File-backed topology storage
pub struct FileStorage {
    data_dir: PathBuf,
    topology_path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let topology_path = data_dir.join("topology.json");
        Self {
            data_dir,
            topology_path,
        }
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        if !self.data_dir.exists() {
            fs::create_dir_all(&self.data_dir).await?;
            info!("Created data directory: {:?}", self.data_dir);
        }
        Ok(())
    }

    /// Load the persisted topology, if any
    pub async fn load(&self) -> Result<Option<ClusterTopology>, StorageError> {
        if !self.topology_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.topology_path).await?;
        let topology: ClusterTopology = serde_json::from_str(&content)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        info!(
            "Loaded topology: {} instances, {} replicasets, routing version {}",
            topology.instances.len(),
            topology.replicasets.len(),
            topology.routing.version
        );
        Ok(Some(topology))
    }

    /// Persist the topology atomically
    pub async fn save(&self, topology: &ClusterTopology) -> Result<(), StorageError> {
        self.ensure_dir().await?;

        let temp_path = self.topology_path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(topology)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.topology_path).await?;
        Ok(())
    }

    /// Load the topology or create a fresh one for `cluster_name`
    pub async fn load_or_create(&self, cluster_name: &str) -> Result<ClusterTopology, StorageError> {
        match self.load().await? {
            Some(topology) => Ok(topology),
            None => {
                let topology = ClusterTopology::new(cluster_name.to_string());
                self.save(&topology).await?;
                info!("Created new cluster '{}'", cluster_name);
                Ok(topology)
            }
        }
    }
}
