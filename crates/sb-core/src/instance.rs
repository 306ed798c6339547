//! Instance metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role an instance plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Forwards bucket-addressed calls to replicaset masters
    Router,
    /// Owns a share of the buckets, member of a replicaset
    Storage,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Router => write!(f, "router"),
            NodeRole::Storage => write!(f, "storage"),
        }
    }
}

/// Instance liveness status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Reachable, heartbeats arriving
    Online,
    /// Heartbeat timed out or a probe failed
    Offline,
    /// Just registered, no heartbeat seen yet
    Unknown,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Online => write!(f, "online"),
            InstanceStatus::Offline => write!(f, "offline"),
            InstanceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Instance metadata held by the topology store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Instance UUID
    pub instance_uuid: Uuid,
    /// Replicaset this instance belongs to
    pub replicaset_uuid: Uuid,
    /// Cluster role
    pub role: NodeRole,
    /// Binary protocol address (host:port)
    pub binary_addr: String,
    /// Management HTTP address, if the instance exposes one
    pub http_addr: Option<String>,
    /// Liveness status
    pub status: InstanceStatus,
    /// Last heartbeat time
    pub last_heartbeat: DateTime<Utc>,
    /// Registration time
    pub registered_at: DateTime<Utc>,
}

impl NodeInfo {
    pub fn new(
        instance_uuid: Uuid,
        replicaset_uuid: Uuid,
        role: NodeRole,
        binary_addr: String,
        http_addr: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            instance_uuid,
            replicaset_uuid,
            role,
            binary_addr,
            http_addr,
            status: InstanceStatus::Unknown,
            last_heartbeat: now,
            registered_at: now,
        }
    }

    /// Record a heartbeat, bringing the instance back online if needed
    pub fn touch(&mut self) {
        self.last_heartbeat = Utc::now();
        if self.status != InstanceStatus::Online {
            self.status = InstanceStatus::Online;
        }
    }

    /// Check whether the heartbeat has timed out
    pub fn is_heartbeat_timeout(&self, timeout_secs: i64) -> bool {
        let elapsed = Utc::now().signed_duration_since(self.last_heartbeat);
        elapsed.num_seconds() > timeout_secs
    }

    pub fn is_online(&self) -> bool {
        self.status == InstanceStatus::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_brings_instance_online() {
        let mut node = NodeInfo::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NodeRole::Storage,
            "127.0.0.1:33011".to_string(),
            None,
        );
        assert_eq!(node.status, InstanceStatus::Unknown);

        node.touch();
        assert_eq!(node.status, InstanceStatus::Online);

        node.status = InstanceStatus::Offline;
        node.touch();
        assert_eq!(node.status, InstanceStatus::Online);
    }

    #[test]
    fn test_fresh_heartbeat_not_timed_out() {
        let node = NodeInfo::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NodeRole::Storage,
            "127.0.0.1:33011".to_string(),
            None,
        );
        assert!(!node.is_heartbeat_timeout(30));
    }
}
