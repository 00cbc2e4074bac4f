//! Directory entries and the per-node store that holds them.
//!
//! `DirectoryEntry` is a tagged union rather than one record with optional
//! `owner`/`sharers` fields: a line is either exclusively owned by one host
//! or shared by a non-empty set of hosts, never both, and never neither.
//! Making that structural means the coherence engine can't accidentally
//! construct an entry violating it.

use crate::types::{HostId, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEntry {
    Shared {
        sharers: Vec<HostId>,
        dir_location: NodeId,
    },
    Exclusive {
        owner: HostId,
        dir_location: NodeId,
    },
}

impl DirectoryEntry {
    pub fn dir_location(&self) -> NodeId {
        match self {
            DirectoryEntry::Shared { dir_location, .. } => *dir_location,
            DirectoryEntry::Exclusive { dir_location, .. } => *dir_location,
        }
    }

    pub fn with_location(self, dir_location: NodeId) -> Self {
        match self {
            DirectoryEntry::Shared { sharers, .. } => DirectoryEntry::Shared {
                sharers,
                dir_location,
            },
            DirectoryEntry::Exclusive { owner, .. } => DirectoryEntry::Exclusive {
                owner,
                dir_location,
            },
        }
    }

    /// The sole holder of the line, if there is exactly one (an owner, or a
    /// single sharer). Used by the migration policy and by the silent
    /// upgrade path (flow 9).
    pub fn sole_holder(&self) -> Option<HostId> {
        match self {
            DirectoryEntry::Exclusive { owner, .. } => Some(*owner),
            DirectoryEntry::Shared { sharers, .. } if sharers.len() == 1 => Some(sharers[0]),
            DirectoryEntry::Shared { .. } => None,
        }
    }

    pub fn holders(&self) -> Vec<HostId> {
        match self {
            DirectoryEntry::Exclusive { owner, .. } => vec![*owner],
            DirectoryEntry::Shared { sharers, .. } => sharers.clone(),
        }
    }
}

use crate::store::SetAssociativeStore;
use crate::types::Addr;

pub struct DirectoryStore {
    id: NodeId,
    store: SetAssociativeStore<DirectoryEntry>,
}

impl DirectoryStore {
    pub fn new(id: NodeId, line_size: u64, num_sets: usize, assoc: usize) -> Self {
        DirectoryStore {
            id,
            store: SetAssociativeStore::new(line_size, num_sets, assoc),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn lookup(&self, addr: Addr) -> Option<&DirectoryEntry> {
        self.store.lookup(addr)
    }

    pub fn contains(&self, addr: Addr) -> bool {
        self.store.contains(addr)
    }

    pub fn remove(&mut self, addr: Addr) -> Option<DirectoryEntry> {
        self.store.remove(addr)
    }

    /// Overwrites (or inserts) the entry at `addr` in place. Only valid
    /// when the caller already knows there's room — either the key was
    /// already present, or `allocate` reported a successful insert.
    pub fn update(&mut self, addr: Addr, entry: DirectoryEntry) {
        self.store.install(addr, entry);
    }

    /// Two-step allocate: installs `entry` if there's room and returns
    /// `None`, or reports the address to evict first via `Some(victim)`.
    pub fn allocate(&mut self, addr: Addr, entry: DirectoryEntry) -> Option<Addr> {
        if self.store.contains(addr) {
            self.store.install(addr, entry);
            return None;
        }
        let set = self.store.split(addr).set;
        if self.store.is_full(set) {
            return self.store.victim(set);
        }
        self.store.install(addr, entry);
        None
    }

    pub fn touch(&mut self, addr: Addr) -> bool {
        self.store.touch(addr)
    }

    pub fn entries(&self) -> impl Iterator<Item = (Addr, &DirectoryEntry)> + '_ {
        self.store.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sole_holder_for_exclusive_and_singleton_shared() {
        let exclusive = DirectoryEntry::Exclusive {
            owner: 3,
            dir_location: 0,
        };
        assert_eq!(exclusive.sole_holder(), Some(3));

        let shared_one = DirectoryEntry::Shared {
            sharers: vec![5],
            dir_location: 0,
        };
        assert_eq!(shared_one.sole_holder(), Some(5));

        let shared_many = DirectoryEntry::Shared {
            sharers: vec![5, 6],
            dir_location: 0,
        };
        assert_eq!(shared_many.sole_holder(), None);
    }

    #[test]
    fn allocate_reports_victim_without_mutating_full_store() {
        let mut store = DirectoryStore::new(10, 64, 1, 1);
        let entry = DirectoryEntry::Exclusive {
            owner: 0,
            dir_location: 10,
        };
        assert_eq!(store.allocate(0, entry.clone()), None);
        let victim = store.allocate(64, entry);
        assert_eq!(victim, Some(0));
        assert!(store.contains(0));
        assert!(!store.contains(64));
    }
}
