//! A single host's private cache: presence-only, same shape as the
//! teacher's `SetAssociativeCache`, generalized over `SetAssociativeStore`.

use crate::store::SetAssociativeStore;
use crate::types::{Addr, HostId};

pub struct HostCache {
    id: HostId,
    store: SetAssociativeStore<()>,
}

impl HostCache {
    pub fn new(id: HostId, line_size: u64, num_sets: usize, assoc: usize) -> Self {
        HostCache {
            id,
            store: SetAssociativeStore::new(line_size, num_sets, assoc),
        }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn contains(&self, addr: Addr) -> bool {
        self.store.contains(addr)
    }

    pub fn touch(&mut self, addr: Addr) -> bool {
        self.store.touch(addr)
    }

    pub fn evict(&mut self, addr: Addr) -> bool {
        self.store.remove(addr).is_some()
    }

    /// Allocates a line for `addr`. `None` means the host now holds a copy
    /// (either it already did, or it was freshly installed); `Some(victim)`
    /// means the set is full and `victim` must be evicted before retrying.
    pub fn allocate(&mut self, addr: Addr) -> Option<Addr> {
        self.store.allocate(addr, || ())
    }

    pub fn addrs(&self) -> impl Iterator<Item = Addr> + '_ {
        self.store.iter().map(|(addr, _)| addr)
    }
}
