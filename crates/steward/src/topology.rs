//! Cluster topology store
//!
//! The single source of truth for instances, replicasets, master pointers,
//! and the derived routing table. All mutations run behind one write lock
//! owned by [`crate::Steward`], so the master pointer of each replicaset has
//! exactly one writer path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use sb_core::{InstanceStatus, NodeInfo, NodeRole, ReplicasetInfo, RoutingTable};

/// Topology store errors
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("replicaset {0} not found")]
    ReplicasetNotFound(Uuid),
    #[error("replicaset {0} has no master")]
    NoMaster(Uuid),
    /// The instance is not a member of the replicaset. The message shape is
    /// part of the admin API contract.
    #[error("replicasets[{0}].master does not exist")]
    MasterDoesNotExist(Uuid),
}

/// Complete cluster state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTopology {
    /// Cluster name
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// All registered instances, routers included
    pub instances: HashMap<Uuid, NodeInfo>,
    /// Replicasets by UUID
    pub replicasets: HashMap<Uuid, ReplicasetInfo>,
    /// Derived bucket/master/address routing
    pub routing: RoutingTable,
    /// Automatic failover flag, off until an operator enables it
    pub failover: bool,
}

impl ClusterTopology {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            name,
            created_at: now,
            updated_at: now,
            instances: HashMap::new(),
            replicasets: HashMap::new(),
            routing: RoutingTable::new(),
            failover: false,
        }
    }

    /// Bump timestamps and the routing version after a mutation
    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.routing.bump_version();
    }

    /// Register an instance, creating its replicaset on first contact.
    ///
    /// The first storage member of a replicaset becomes its master. When a
    /// new storage replicaset appears, buckets are re-spread over all of
    /// them. Returns true for a first-time registration.
    pub fn register_instance(&mut self, mut node: NodeInfo) -> bool {
        let instance_uuid = node.instance_uuid;
        let replicaset_uuid = node.replicaset_uuid;
        let is_new = !self.instances.contains_key(&instance_uuid);

        // Registration counts as proof of life
        node.touch();
        self.routing
            .set_node_addr(instance_uuid, node.binary_addr.clone());

        let replicaset = self
            .replicasets
            .entry(replicaset_uuid)
            .or_insert_with(|| ReplicasetInfo::new(replicaset_uuid));
        let replicaset_is_new = replicaset.members.is_empty();
        replicaset.add_member(instance_uuid);

        if node.role == NodeRole::Storage && replicaset.master.is_none() {
            replicaset.set_master(instance_uuid);
            self.routing.set_master(replicaset_uuid, instance_uuid);
            info!(
                "Bootstrapped master {} for replicaset {}",
                instance_uuid, replicaset_uuid
            );
        }

        let role = node.role;
        self.instances.insert(instance_uuid, node);

        if role == NodeRole::Storage && replicaset_is_new {
            self.respread_buckets();
        }

        self.touch();
        is_new
    }

    /// Re-spread buckets over all storage replicasets, deterministically
    /// ordered by replicaset UUID.
    fn respread_buckets(&mut self) {
        let mut storage_replicasets: Vec<Uuid> = self
            .replicasets
            .values()
            .filter(|rs| {
                rs.members
                    .iter()
                    .any(|m| self.instances.get(m).map(|n| n.role) == Some(NodeRole::Storage))
            })
            .map(|rs| rs.uuid)
            .collect();
        storage_replicasets.sort();
        self.routing.assign_buckets(&storage_replicasets);
    }

    /// Record a heartbeat. Returns false for unknown instances.
    pub fn heartbeat(&mut self, instance_uuid: &Uuid) -> bool {
        match self.instances.get_mut(instance_uuid) {
            Some(node) => {
                node.touch();
                true
            }
            None => false,
        }
    }

    /// Mark an instance offline. Returns true when the status changed.
    pub fn mark_offline(&mut self, instance_uuid: &Uuid) -> bool {
        match self.instances.get_mut(instance_uuid) {
            Some(node) if node.status != InstanceStatus::Offline => {
                node.status = InstanceStatus::Offline;
                true
            }
            _ => false,
        }
    }

    /// Current master of a replicaset
    pub fn get_master(&self, replicaset_uuid: &Uuid) -> Result<Uuid, TopologyError> {
        let replicaset = self
            .replicasets
            .get(replicaset_uuid)
            .ok_or(TopologyError::ReplicasetNotFound(*replicaset_uuid))?;
        replicaset
            .master
            .ok_or(TopologyError::NoMaster(*replicaset_uuid))
    }

    /// Reassign the master of a replicaset.
    ///
    /// Fails when the replicaset is unknown or the instance is not one of
    /// its members. On success the routing table is updated in the same
    /// mutation, so readers never observe two masters.
    pub fn set_master(
        &mut self,
        replicaset_uuid: Uuid,
        instance_uuid: Uuid,
    ) -> Result<(), TopologyError> {
        let replicaset = self
            .replicasets
            .get_mut(&replicaset_uuid)
            .ok_or(TopologyError::ReplicasetNotFound(replicaset_uuid))?;
        if !replicaset.set_master(instance_uuid) {
            return Err(TopologyError::MasterDoesNotExist(replicaset_uuid));
        }
        self.routing.set_master(replicaset_uuid, instance_uuid);
        self.touch();
        info!(
            "Replicaset {} master set to {}",
            replicaset_uuid, instance_uuid
        );
        Ok(())
    }

    /// Online members of a replicaset, ascending by UUID
    pub fn online_members(&self, replicaset_uuid: &Uuid) -> Vec<Uuid> {
        self.replicasets
            .get(replicaset_uuid)
            .map(|rs| {
                rs.members
                    .iter()
                    .filter(|m| self.instances.get(m).map(NodeInfo::is_online).unwrap_or(false))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Cluster statistics for the admin overview
    pub fn stats(&self) -> ClusterStats {
        ClusterStats {
            instance_count: self.instances.len(),
            online_instances: self.instances.values().filter(|n| n.is_online()).count(),
            replicaset_count: self.replicasets.len(),
            routing_version: self.routing.version,
            unassigned_buckets: self.routing.unassigned_bucket_count(),
            failover: self.failover,
        }
    }
}

/// Cluster statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStats {
    pub instance_count: usize,
    pub online_instances: usize,
    pub replicaset_count: usize,
    pub routing_version: u64,
    pub unassigned_buckets: usize,
    pub failover: bool,
}
