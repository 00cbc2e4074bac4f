//! Federates the device's directory store with every switch's, so the
//! engine can ask "who holds the directory entry for this address" without
//! caring which physical store it lives in.

use std::collections::BTreeMap;

use crate::directory::{DirectoryEntry, DirectoryStore};
use crate::error::SimError;
use crate::types::{Addr, NodeId};

pub struct DirectoryIndex {
    device_id: NodeId,
    device: DirectoryStore,
    switches: BTreeMap<NodeId, DirectoryStore>,
}

impl DirectoryIndex {
    pub fn new(device: DirectoryStore, switches: BTreeMap<NodeId, DirectoryStore>) -> Self {
        DirectoryIndex {
            device_id: device.id(),
            device,
            switches,
        }
    }

    pub fn device_id(&self) -> NodeId {
        self.device_id
    }

    /// Checks the device first, then each switch in id order, and returns
    /// the node holding the entry along with a read-only view of it.
    pub fn find(&self, addr: Addr) -> Option<(NodeId, &DirectoryEntry)> {
        if let Some(entry) = self.device.lookup(addr) {
            return Some((self.device_id, entry));
        }
        for store in self.switches.values() {
            if let Some(entry) = store.lookup(addr) {
                return Some((store.id(), entry));
            }
        }
        None
    }

    pub fn locate(&self, addr: Addr) -> Option<NodeId> {
        self.find(addr).map(|(id, _)| id)
    }

    pub fn resolve(&self, id: NodeId) -> Result<&DirectoryStore, SimError> {
        if id == self.device_id {
            Ok(&self.device)
        } else {
            self.switches.get(&id).ok_or(SimError::UnknownNodeId(id))
        }
    }

    pub fn resolve_mut(&mut self, id: NodeId) -> Result<&mut DirectoryStore, SimError> {
        if id == self.device_id {
            Ok(&mut self.device)
        } else {
            self.switches
                .get_mut(&id)
                .ok_or(SimError::UnknownNodeId(id))
        }
    }

    /// All directory stores (device first, then switches in id order).
    /// Used only by the invariant checker.
    pub fn all_stores(&self) -> impl Iterator<Item = &DirectoryStore> + '_ {
        std::iter::once(&self.device).chain(self.switches.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> DirectoryIndex {
        let device = DirectoryStore::new(3, 64, 1, 1);
        let mut switches = BTreeMap::new();
        switches.insert(4, DirectoryStore::new(4, 64, 1, 1));
        switches.insert(5, DirectoryStore::new(5, 64, 1, 1));
        DirectoryIndex::new(device, switches)
    }

    #[test]
    fn find_checks_device_before_switches() {
        let mut idx = index();
        let entry = DirectoryEntry::Exclusive {
            owner: 0,
            dir_location: 3,
        };
        idx.resolve_mut(3).unwrap().allocate(0x40, entry.clone());
        idx.resolve_mut(4).unwrap().allocate(0x40, entry);
        let (found_at, _) = idx.find(0x40).unwrap();
        assert_eq!(found_at, 3);
    }

    #[test]
    fn resolve_unknown_node_errors() {
        let idx = index();
        assert!(matches!(idx.resolve(99), Err(SimError::UnknownNodeId(99))));
    }
}
