//! Replicaset metadata

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A group of storage instances replicating the same buckets,
/// with a single write master at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicasetInfo {
    /// Replicaset UUID
    pub uuid: Uuid,
    /// Member instance UUIDs (ordered for deterministic iteration)
    pub members: BTreeSet<Uuid>,
    /// Current master; must always be a member when set
    pub master: Option<Uuid>,
    /// Relative bucket weight (reserved for uneven bucket distribution)
    pub weight: u32,
}

impl ReplicasetInfo {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            members: BTreeSet::new(),
            master: None,
            weight: 1,
        }
    }

    pub fn has_member(&self, instance_uuid: &Uuid) -> bool {
        self.members.contains(instance_uuid)
    }

    pub fn add_member(&mut self, instance_uuid: Uuid) -> bool {
        self.members.insert(instance_uuid)
    }

    /// Remove a member; clears the master pointer when it referenced the
    /// removed instance.
    pub fn remove_member(&mut self, instance_uuid: &Uuid) {
        self.members.remove(instance_uuid);
        if self.master.as_ref() == Some(instance_uuid) {
            self.master = None;
        }
    }

    /// Set the master. Returns false when the instance is not a member.
    pub fn set_master(&mut self, instance_uuid: Uuid) -> bool {
        if self.members.contains(&instance_uuid) {
            self.master = Some(instance_uuid);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_master_requires_membership() {
        let mut rs = ReplicasetInfo::new(Uuid::new_v4());
        let member = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        rs.add_member(member);

        assert!(rs.set_master(member));
        assert_eq!(rs.master, Some(member));

        assert!(!rs.set_master(stranger));
        assert_eq!(rs.master, Some(member));
    }

    #[test]
    fn test_remove_member_clears_master() {
        let mut rs = ReplicasetInfo::new(Uuid::new_v4());
        let member = Uuid::new_v4();
        rs.add_member(member);
        rs.set_master(member);

        rs.remove_member(&member);
        assert!(rs.master.is_none());
        assert!(rs.members.is_empty());
    }
}
