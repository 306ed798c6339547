//! Routing table
//!
//! Maps buckets to replicasets and replicasets to their current master.
//! Produced by the steward, consumed by routers; the version number bumps on
//! every topology change so consumers can ignore stale tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::bucket::TOTAL_BUCKETS;

/// Routing lookup errors
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("bucket {0} is not assigned to any replicaset")]
    NoBucket(u32),
    #[error("bucket {0} is out of range")]
    BucketOutOfRange(u32),
    #[error("replicaset {0} has no master")]
    NoMaster(Uuid),
    #[error("no address known for instance {0}")]
    NoAddress(Uuid),
}

/// Routing table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Version number, incremented on each change
    pub version: u64,
    /// Bucket to replicaset mapping; fixed length of `TOTAL_BUCKETS`
    pub buckets: Vec<Option<Uuid>>,
    /// Replicaset to current master mapping
    pub masters: HashMap<Uuid, Uuid>,
    /// Instance binary address mapping
    pub node_addrs: HashMap<Uuid, String>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            version: 0,
            buckets: vec![None; TOTAL_BUCKETS as usize],
            masters: HashMap::new(),
            node_addrs: HashMap::new(),
        }
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Spread buckets evenly over the given replicasets.
    ///
    /// The order of `replicasets` decides which ranges land where, so callers
    /// pass a deterministically sorted list. The last replicaset absorbs the
    /// remainder.
    pub fn assign_buckets(&mut self, replicasets: &[Uuid]) {
        if replicasets.is_empty() {
            self.buckets = vec![None; TOTAL_BUCKETS as usize];
            return;
        }

        let per_replicaset = TOTAL_BUCKETS / replicasets.len() as u32;
        for (i, rs_uuid) in replicasets.iter().enumerate() {
            let start = i as u32 * per_replicaset;
            let end = if i == replicasets.len() - 1 {
                TOTAL_BUCKETS
            } else {
                (i as u32 + 1) * per_replicaset
            };
            for bucket in start..end {
                self.buckets[bucket as usize] = Some(*rs_uuid);
            }
        }
    }

    pub fn set_master(&mut self, replicaset_uuid: Uuid, instance_uuid: Uuid) {
        self.masters.insert(replicaset_uuid, instance_uuid);
    }

    pub fn set_node_addr(&mut self, instance_uuid: Uuid, addr: String) {
        self.node_addrs.insert(instance_uuid, addr);
    }

    pub fn remove_instance(&mut self, instance_uuid: &Uuid) {
        self.node_addrs.remove(instance_uuid);
        self.masters.retain(|_, master| master != instance_uuid);
    }

    /// Replicaset owning the bucket
    pub fn replicaset_for_bucket(&self, bucket: u32) -> Result<Uuid, RoutingError> {
        self.buckets
            .get(bucket as usize)
            .ok_or(RoutingError::BucketOutOfRange(bucket))?
            .ok_or(RoutingError::NoBucket(bucket))
    }

    /// Resolve a bucket to the binary address of the owning master.
    ///
    /// Returns (replicaset_uuid, master_uuid, master_addr).
    pub fn master_for_bucket(&self, bucket: u32) -> Result<(Uuid, Uuid, String), RoutingError> {
        let replicaset_uuid = self.replicaset_for_bucket(bucket)?;
        let master = *self
            .masters
            .get(&replicaset_uuid)
            .ok_or(RoutingError::NoMaster(replicaset_uuid))?;
        let addr = self
            .node_addrs
            .get(&master)
            .cloned()
            .ok_or(RoutingError::NoAddress(master))?;
        Ok((replicaset_uuid, master, addr))
    }

    pub fn unassigned_bucket_count(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_none()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.buckets.iter().all(|b| b.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_buckets_covers_all() {
        let mut table = RoutingTable::new();
        let rs1 = Uuid::new_v4();
        let rs2 = Uuid::new_v4();
        let rs3 = Uuid::new_v4();

        table.assign_buckets(&[rs1, rs2, rs3]);
        assert!(table.is_complete());
        assert_eq!(table.unassigned_bucket_count(), 0);

        // First and last bucket land on first and last replicaset
        assert_eq!(table.replicaset_for_bucket(0).unwrap(), rs1);
        assert_eq!(table.replicaset_for_bucket(TOTAL_BUCKETS - 1).unwrap(), rs3);
    }

    #[test]
    fn test_master_for_bucket() {
        let mut table = RoutingTable::new();
        let rs = Uuid::new_v4();
        let master = Uuid::new_v4();

        table.assign_buckets(&[rs]);
        table.set_master(rs, master);
        table.set_node_addr(master, "127.0.0.1:33011".to_string());

        let (found_rs, found_master, addr) = table.master_for_bucket(1).unwrap();
        assert_eq!(found_rs, rs);
        assert_eq!(found_master, master);
        assert_eq!(addr, "127.0.0.1:33011");
    }

    #[test]
    fn test_master_for_bucket_errors() {
        let mut table = RoutingTable::new();
        assert!(matches!(
            table.master_for_bucket(1),
            Err(RoutingError::NoBucket(1))
        ));
        assert!(matches!(
            table.master_for_bucket(TOTAL_BUCKETS + 1),
            Err(RoutingError::BucketOutOfRange(_))
        ));

        let rs = Uuid::new_v4();
        table.assign_buckets(&[rs]);
        assert!(matches!(
            table.master_for_bucket(1),
            Err(RoutingError::NoMaster(_))
        ));
    }

    #[test]
    fn test_remove_instance_clears_master() {
        let mut table = RoutingTable::new();
        let rs = Uuid::new_v4();
        let master = Uuid::new_v4();
        table.assign_buckets(&[rs]);
        table.set_master(rs, master);
        table.set_node_addr(master, "127.0.0.1:33011".to_string());

        table.remove_instance(&master);
        assert!(matches!(
            table.master_for_bucket(1),
            Err(RoutingError::NoMaster(_))
        ));
    }
}
