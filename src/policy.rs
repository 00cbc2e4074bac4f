//! Directory placement and migration policies.
//!
//! Both are pure decision functions over the engine's observable state —
//! they read a topology and a directory entry and return a destination,
//! but never touch a store themselves. The engine carries out whatever
//! they decide.

use serde::Deserialize;

use crate::directory::DirectoryEntry;
use crate::topology::Topology;
use crate::types::{HostId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementPolicy {
    /// Every new directory entry is placed at the device.
    Default,
    /// Round-robins over `intermediate_path + [device]`, indexed by
    /// request id.
    Modulo,
}

impl PlacementPolicy {
    pub fn choose(&self, reqid: u64, device_id: NodeId, intermediate_path: &[NodeId]) -> NodeId {
        match self {
            PlacementPolicy::Default => device_id,
            PlacementPolicy::Modulo => {
                let mut candidates: Vec<NodeId> = intermediate_path.to_vec();
                candidates.push(device_id);
                candidates[(reqid as usize) % candidates.len()]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPolicy {
    /// Directory entries never move once placed.
    None,
    /// After a hit transition that leaves the line with exactly one
    /// holder not equal to the requestor, consider moving the entry from
    /// the device to whichever intermediate switch minimizes the
    /// round-trip cost of future requests between the requestor and that
    /// holder.
    Lazy,
}

impl MigrationPolicy {
    /// Returns the switch the entry should move to, or `None` to leave it
    /// where it is.
    ///
    /// Per spec condition (a), migration only ever considers an entry that
    /// is currently resident at the device — an entry already moved onto a
    /// switch never migrates again.
    #[allow(clippy::too_many_arguments)]
    pub fn decide(
        &self,
        entry: &DirectoryEntry,
        location: NodeId,
        device_id: NodeId,
        requestor: HostId,
        intermediate: NodeId,
        intermediate_path: &[NodeId],
        topology: &dyn Topology,
    ) -> Option<NodeId> {
        if *self == MigrationPolicy::None {
            return None;
        }
        if location != device_id {
            return None;
        }
        if intermediate_path.is_empty() {
            return None;
        }
        let holder = entry.sole_holder()?;
        if holder == requestor {
            return None;
        }
        intermediate_path.iter().copied().min_by_key(|&switch| {
            2 * (topology.cost(requestor, intermediate)
                + topology.cost(intermediate, switch)
                + topology.cost(switch, holder))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::GraphTopology;

    #[test]
    fn default_placement_always_device() {
        let policy = PlacementPolicy::Default;
        assert_eq!(policy.choose(0, 3, &[4, 5]), 3);
        assert_eq!(policy.choose(7, 3, &[4, 5]), 3);
    }

    #[test]
    fn modulo_placement_round_robins_by_reqid() {
        let policy = PlacementPolicy::Modulo;
        // candidates = [4, 5, 3] (device appended last)
        assert_eq!(policy.choose(0, 3, &[4, 5]), 4);
        assert_eq!(policy.choose(1, 3, &[4, 5]), 5);
        assert_eq!(policy.choose(2, 3, &[4, 5]), 3);
        assert_eq!(policy.choose(3, 3, &[4, 5]), 4);
    }

    #[test]
    fn no_migration_policy_never_moves() {
        let topo = GraphTopology::new(5, &[(0, 3), (1, 3), (3, 4)]).unwrap();
        let entry = DirectoryEntry::Exclusive {
            owner: 1,
            dir_location: 3,
        };
        assert_eq!(
            MigrationPolicy::None.decide(&entry, 3, 3, 0, 4, &[4], &topo),
            None
        );
    }

    #[test]
    fn lazy_migration_picks_minimizing_switch() {
        // requestor=0, holder=1, intermediate=3, candidate switches {4, 2}.
        // 0-3-2-1 is a 1-hop detour via switch 2; 0-3-4-6-1 is longer via
        // switch 4, so the policy should prefer 2.
        let topo = GraphTopology::new(7, &[(0, 3), (3, 2), (2, 1), (3, 4), (4, 6), (6, 1)])
            .unwrap();
        let entry = DirectoryEntry::Exclusive {
            owner: 1,
            dir_location: 5,
        };
        let dest = MigrationPolicy::Lazy.decide(&entry, 5, 5, 0, 3, &[4, 2], &topo);
        assert_eq!(dest, Some(2));
    }

    #[test]
    fn lazy_migration_skips_when_requestor_is_sole_holder() {
        let topo = GraphTopology::new(3, &[(0, 1), (1, 2)]).unwrap();
        let entry = DirectoryEntry::Exclusive {
            owner: 0,
            dir_location: 2,
        };
        assert_eq!(
            MigrationPolicy::Lazy.decide(&entry, 2, 2, 0, 1, &[1], &topo),
            None
        );
    }

    #[test]
    fn lazy_migration_skips_when_entry_already_off_device() {
        // Entry resides at switch 4 (not the device, 5), so condition (a)
        // forbids a switch-to-switch migration even though a cheaper
        // destination exists.
        let topo = GraphTopology::new(7, &[(0, 3), (3, 2), (2, 1), (3, 4), (4, 6), (6, 1)])
            .unwrap();
        let entry = DirectoryEntry::Exclusive {
            owner: 1,
            dir_location: 4,
        };
        let dest = MigrationPolicy::Lazy.decide(&entry, 4, 5, 0, 3, &[4, 2], &topo);
        assert_eq!(dest, None);
    }
}
