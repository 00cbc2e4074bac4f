//! The coherence engine: given a hit or miss, decides the protocol
//! transition, carries out whatever cache-line allocation and eviction it
//! requires, and accounts for the hop cost of doing so against a baseline
//! where the directory never leaves the device.

use std::collections::BTreeMap;

use log::debug;

use crate::config::SimConfig;
use crate::directory::{DirectoryEntry, DirectoryStore};
use crate::directory_index::DirectoryIndex;
use crate::error::SimError;
use crate::flow::{FlowAccountant, FlowOutputEntry, FlowType};
use crate::host::HostCache;
use crate::policy::{MigrationPolicy, PlacementPolicy};
use crate::topology::{GraphTopology, Topology};
use crate::trace::Op;
use crate::types::{Addr, HostId, NodeId};

/// Cascading eviction is bounded: a failed two-step allocate can only be
/// caused by the single victim we were just told about, so success always
/// arrives within a handful of retries. A much larger bound just turns a
/// latent bug into a hard error instead of a hang.
const MAX_RETRIES: usize = 64;

pub struct CoherenceEngine {
    hosts: Vec<HostCache>,
    directories: DirectoryIndex,
    topology: GraphTopology,
    placement: PlacementPolicy,
    migration: MigrationPolicy,
    device_id: NodeId,
    intermediate: NodeId,
    intermediate_path: Vec<NodeId>,
    invariant_check_interval: u64,
    reqid: u64,
    accountant: FlowAccountant,
}

impl CoherenceEngine {
    pub fn new(config: &SimConfig) -> Result<Self, SimError> {
        let hosts = (0..config.num_hosts)
            .map(|id| HostCache::new(id, config.host_line_size, config.host_num_sets, config.host_assoc))
            .collect();

        let device = DirectoryStore::new(
            config.device_id,
            config.device_line_size,
            config.device_num_sets,
            config.device_assoc,
        );
        let switches: BTreeMap<NodeId, DirectoryStore> = config
            .switch_ids
            .iter()
            .map(|&id| {
                (
                    id,
                    DirectoryStore::new(id, config.switch_line_size, config.switch_num_sets, config.switch_assoc),
                )
            })
            .collect();
        let directories = DirectoryIndex::new(device, switches);

        let topology = GraphTopology::new(config.num_nodes, &config.topology_edges)?;

        Ok(CoherenceEngine {
            hosts,
            directories,
            topology,
            placement: config.placement_policy,
            migration: config.migration_policy,
            device_id: config.device_id,
            intermediate: config.intermediate_switch,
            intermediate_path: config.intermediate_path.clone(),
            invariant_check_interval: config.invariant_check_interval,
            reqid: 0,
            accountant: FlowAccountant::new(),
        })
    }

    pub fn flow_summary(&self) -> BTreeMap<String, FlowOutputEntry> {
        self.accountant.to_output()
    }

    pub fn reqid(&self) -> u64 {
        self.reqid
    }

    pub fn process(&mut self, addr: Addr, op: Op, requestor: HostId) -> Result<(), SimError> {
        let reqid = self.reqid;
        debug!("req {reqid}: addr={addr:#x} op={op:?} requestor={requestor}");

        match self.directories.find(addr) {
            Some((location, entry)) => {
                let entry = entry.clone();
                self.handle_hit(addr, op, requestor, location, entry)?;
            }
            None => self.handle_miss(addr, op, requestor, reqid)?,
        }

        self.reqid += 1;
        if self.reqid.is_multiple_of(self.invariant_check_interval) {
            self.check_invariants()?;
        }
        Ok(())
    }

    fn handle_hit(
        &mut self,
        addr: Addr,
        op: Op,
        requestor: HostId,
        location: NodeId,
        entry: DirectoryEntry,
    ) -> Result<(), SimError> {
        match entry {
            DirectoryEntry::Exclusive { owner, .. } if owner == requestor => {
                self.directories.resolve_mut(location)?.touch(addr);
                self.hosts[requestor as usize].touch(addr);
                Ok(())
            }
            DirectoryEntry::Exclusive { owner, dir_location } => match op {
                Op::Read => self.hit_exclusive_read(addr, requestor, owner, location, dir_location),
                Op::Write => self.hit_exclusive_write(addr, requestor, owner, location, dir_location),
            },
            DirectoryEntry::Shared { sharers, dir_location } => {
                let already_shares = sharers.contains(&requestor);
                match (already_shares, op) {
                    (true, Op::Read) => {
                        self.directories.resolve_mut(location)?.touch(addr);
                        self.hosts[requestor as usize].touch(addr);
                        Ok(())
                    }
                    (true, Op::Write) if sharers.len() == 1 => {
                        self.hit_shared_write_promote(addr, requestor, location, dir_location)
                    }
                    (_, Op::Write) => {
                        self.hit_shared_write_invalidate(addr, requestor, sharers, location, dir_location)
                    }
                    (false, Op::Read) => {
                        self.hit_shared_read_add(addr, requestor, sharers, location, dir_location)
                    }
                }
            }
        }
    }

    fn hit_exclusive_read(
        &mut self,
        addr: Addr,
        requestor: HostId,
        old_owner: HostId,
        location: NodeId,
        dir_location: NodeId,
    ) -> Result<(), SimError> {
        let pre_entry = DirectoryEntry::Exclusive {
            owner: old_owner,
            dir_location,
        };
        self.allocate_host(requestor, addr)?;
        let new_entry = DirectoryEntry::Shared {
            sharers: vec![old_owner, requestor],
            dir_location,
        };
        self.finalize_hit(
            addr,
            location,
            &pre_entry,
            new_entry,
            requestor,
            FlowType::HitExclusiveReadDowngrade,
            Some(old_owner),
        )
    }

    fn hit_exclusive_write(
        &mut self,
        addr: Addr,
        requestor: HostId,
        old_owner: HostId,
        location: NodeId,
        dir_location: NodeId,
    ) -> Result<(), SimError> {
        let pre_entry = DirectoryEntry::Exclusive {
            owner: old_owner,
            dir_location,
        };
        self.allocate_host(requestor, addr)?;
        self.hosts[old_owner as usize].evict(addr);
        let new_entry = DirectoryEntry::Exclusive {
            owner: requestor,
            dir_location,
        };
        self.finalize_hit(
            addr,
            location,
            &pre_entry,
            new_entry,
            requestor,
            FlowType::HitExclusiveWriteTransfer,
            Some(old_owner),
        )
    }

    fn hit_shared_read_add(
        &mut self,
        addr: Addr,
        requestor: HostId,
        sharers: Vec<HostId>,
        location: NodeId,
        dir_location: NodeId,
    ) -> Result<(), SimError> {
        let pre_entry = DirectoryEntry::Shared {
            sharers: sharers.clone(),
            dir_location,
        };
        self.allocate_host(requestor, addr)?;
        let closest = self.topology.closest(requestor, &sharers);
        let mut new_sharers = sharers;
        new_sharers.push(requestor);
        let new_entry = DirectoryEntry::Shared {
            sharers: new_sharers,
            dir_location,
        };
        self.finalize_hit(
            addr,
            location,
            &pre_entry,
            new_entry,
            requestor,
            FlowType::HitSharedReadAddSharer,
            Some(closest),
        )
    }

    fn hit_shared_write_promote(
        &mut self,
        addr: Addr,
        requestor: HostId,
        location: NodeId,
        dir_location: NodeId,
    ) -> Result<(), SimError> {
        let pre_entry = DirectoryEntry::Shared {
            sharers: vec![requestor],
            dir_location,
        };
        let new_entry = DirectoryEntry::Exclusive {
            owner: requestor,
            dir_location,
        };
        self.finalize_hit(
            addr,
            location,
            &pre_entry,
            new_entry,
            requestor,
            FlowType::HitSharedWritePromote,
            None,
        )
    }

    fn hit_shared_write_invalidate(
        &mut self,
        addr: Addr,
        requestor: HostId,
        sharers: Vec<HostId>,
        location: NodeId,
        dir_location: NodeId,
    ) -> Result<(), SimError> {
        let pre_entry = DirectoryEntry::Shared {
            sharers: sharers.clone(),
            dir_location,
        };
        let others: Vec<HostId> = sharers.iter().copied().filter(|&h| h != requestor).collect();
        let farthest = self.topology.furthest(requestor, &others);
        for &h in &others {
            self.hosts[h as usize].evict(addr);
        }
        self.allocate_host(requestor, addr)?;
        let new_entry = DirectoryEntry::Exclusive {
            owner: requestor,
            dir_location,
        };
        self.finalize_hit(
            addr,
            location,
            &pre_entry,
            new_entry,
            requestor,
            FlowType::HitSharedWriteInvalidate,
            Some(farthest),
        )
    }

    /// Accounts for the hop cost of this hit against the current directory
    /// location, then applies the migration policy and writes the
    /// transitioned entry back to wherever it decides the entry should
    /// live from now on.
    ///
    /// The migration decision is evaluated against `pre_entry` — the
    /// directory entry as it stood before this transition — not the
    /// already-mutated `new_entry`: the requestor is always among the
    /// post-transition holders, so `new_entry.sole_holder()` could never
    /// name anyone other than the requestor and condition (c) would always
    /// exclude it.
    #[allow(clippy::too_many_arguments)]
    fn finalize_hit(
        &mut self,
        addr: Addr,
        location: NodeId,
        pre_entry: &DirectoryEntry,
        new_entry: DirectoryEntry,
        requestor: HostId,
        flow: FlowType,
        other: Option<HostId>,
    ) -> Result<(), SimError> {
        let device = self.device_id;
        let i = self.intermediate;
        let (path, base) = match other {
            Some(o) => (
                vec![requestor, i, location, o, i, location, requestor],
                vec![requestor, device, o, device, requestor],
            ),
            None => (
                vec![requestor, i, location, i, requestor],
                vec![requestor, device, requestor],
            ),
        };
        self.emit_flow(flow, &path, &base);

        let migrate_to = self.migration.decide(
            pre_entry,
            location,
            device,
            requestor,
            i,
            &self.intermediate_path,
            &self.topology,
        );

        match migrate_to {
            Some(target) if target != location => {
                self.allocate_directory(target, addr, new_entry.with_location(target))?;
                self.directories.resolve_mut(location)?.remove(addr);
            }
            _ => {
                self.directories.resolve_mut(location)?.update(addr, new_entry);
            }
        }
        Ok(())
    }

    fn handle_miss(&mut self, addr: Addr, op: Op, requestor: HostId, reqid: u64) -> Result<(), SimError> {
        let device = self.device_id;
        let location = self.placement.choose(reqid, device, &self.intermediate_path);
        let entry = match op {
            Op::Read => DirectoryEntry::Shared {
                sharers: vec![requestor],
                dir_location: location,
            },
            Op::Write => DirectoryEntry::Exclusive {
                owner: requestor,
                dir_location: location,
            },
        };
        self.allocate_directory(location, addr, entry)?;
        self.allocate_host(requestor, addr)?;

        let i = self.intermediate;
        let path = vec![requestor, i, device, i, requestor];
        let base = vec![requestor, device, requestor];
        self.emit_flow(FlowType::Miss, &path, &base);
        Ok(())
    }

    /// Two-step allocate with cascade: retries the host allocate after
    /// evicting whatever victim it reports, until it succeeds.
    fn allocate_host(&mut self, host_id: HostId, addr: Addr) -> Result<(), SimError> {
        for _ in 0..MAX_RETRIES {
            match self.hosts[host_id as usize].allocate(addr) {
                None => return Ok(()),
                Some(victim) => self.handle_host_eviction(victim, host_id)?,
            }
        }
        Err(SimError::CapacityRetryFailure {
            addr,
            store: host_id,
        })
    }

    fn allocate_directory(&mut self, location: NodeId, addr: Addr, entry: DirectoryEntry) -> Result<(), SimError> {
        for _ in 0..MAX_RETRIES {
            match self.directories.resolve_mut(location)?.allocate(addr, entry.clone()) {
                None => return Ok(()),
                Some(victim) => self.handle_directory_eviction(victim, location)?,
            }
        }
        Err(SimError::CapacityRetryFailure {
            addr,
            store: location,
        })
    }

    /// `evicting_host` dropped `addr` to make room. Update (or remove) its
    /// directory entry to match, and account for the eviction.
    fn handle_host_eviction(&mut self, addr: Addr, evicting_host: HostId) -> Result<(), SimError> {
        let location = self
            .directories
            .locate(addr)
            .ok_or(SimError::MissingDirectoryOnEviction {
                addr,
                host: evicting_host,
            })?;
        let entry = self
            .directories
            .resolve(location)?
            .lookup(addr)
            .cloned()
            .expect("locate and resolve must agree");

        let device = self.device_id;
        let i = self.intermediate;

        match entry {
            DirectoryEntry::Exclusive { owner, .. } => {
                self.hosts[owner as usize].evict(addr);
                self.directories.resolve_mut(location)?.remove(addr);
                let path = vec![owner, i, device, i, owner];
                let base = vec![owner, device, owner];
                self.emit_flow(FlowType::HostEvictExclusive, &path, &base);
            }
            DirectoryEntry::Shared { mut sharers, dir_location } => {
                sharers.retain(|&h| h != evicting_host);
                self.hosts[evicting_host as usize].evict(addr);
                if sharers.is_empty() {
                    self.directories.resolve_mut(location)?.remove(addr);
                    let path = vec![evicting_host, i, device, i, evicting_host];
                    let base = vec![evicting_host, device, evicting_host];
                    self.emit_flow(FlowType::HostEvictSharedLast, &path, &base);
                } else {
                    self.directories
                        .resolve_mut(location)?
                        .update(addr, DirectoryEntry::Shared { sharers, dir_location });
                    let path = vec![evicting_host, i, location, i, evicting_host];
                    let base = vec![evicting_host, device, evicting_host];
                    self.emit_flow(FlowType::HostEvictSharedRemaining, &path, &base);
                }
            }
        }
        Ok(())
    }

    /// The directory store at `location` evicted `addr` to make room.
    /// Drop every host copy the entry names and account for it.
    fn handle_directory_eviction(&mut self, addr: Addr, location: NodeId) -> Result<(), SimError> {
        let entry = self
            .directories
            .resolve_mut(location)?
            .remove(addr)
            .ok_or_else(|| SimError::InvariantViolation {
                invariant: "I1",
                addr,
                detail: "directory eviction victim vanished before removal".into(),
            })?;

        let device = self.device_id;
        let i = self.intermediate;

        match &entry {
            DirectoryEntry::Exclusive { owner, .. } => {
                self.hosts[*owner as usize].evict(addr);
                let path = vec![location, i, *owner, i, device];
                let base = vec![device, *owner, device];
                self.emit_flow(FlowType::DirEvictExclusive, &path, &base);
            }
            DirectoryEntry::Shared { sharers, .. } => {
                let furthest = self.topology.furthest(location, sharers);
                let mut pending = sharers.clone();
                while let Some(h) = pending.pop() {
                    self.hosts[h as usize].evict(addr);
                }
                let path = vec![location, i, furthest, i, device];
                let base = vec![device, furthest, device];
                self.emit_flow(FlowType::DirEvictShared, &path, &base);
            }
        }
        Ok(())
    }

    fn emit_flow(&mut self, flow: FlowType, path: &[NodeId], base: &[NodeId]) {
        let cost_policy = self.topology.path_cost(path);
        let cost_baseline = self.topology.path_cost(base);
        self.accountant.record(flow, cost_policy, cost_baseline);
    }

    /// Verifies I1, I4, I5 and I7 (§3) across every store. I2/I3 hold by
    /// construction (`DirectoryEntry`'s variants), and I6 holds by
    /// construction of `lru::LruCache` itself.
    fn check_invariants(&self) -> Result<(), SimError> {
        let mut seen = std::collections::HashSet::new();
        for store in self.directories.all_stores() {
            for (addr, entry) in store.entries() {
                if !seen.insert(addr) {
                    return Err(SimError::InvariantViolation {
                        invariant: "I1",
                        addr,
                        detail: "directory entry present in more than one store".into(),
                    });
                }
                match entry {
                    DirectoryEntry::Exclusive { owner, .. } => {
                        for host in &self.hosts {
                            let should_hold = host.id() == *owner;
                            if host.contains(addr) != should_hold {
                                return Err(SimError::InvariantViolation {
                                    invariant: "I4",
                                    addr,
                                    detail: format!(
                                        "host {} copy presence ({}) disagrees with owner {owner}",
                                        host.id(),
                                        host.contains(addr)
                                    ),
                                });
                            }
                        }
                    }
                    DirectoryEntry::Shared { sharers, .. } => {
                        for host in &self.hosts {
                            let should_hold = sharers.contains(&host.id());
                            if host.contains(addr) != should_hold {
                                return Err(SimError::InvariantViolation {
                                    invariant: "I5",
                                    addr,
                                    detail: format!(
                                        "host {} copy presence ({}) disagrees with sharer set",
                                        host.id(),
                                        host.contains(addr)
                                    ),
                                });
                            }
                        }
                    }
                }
            }
        }

        for host in &self.hosts {
            for addr in host.addrs() {
                if self.directories.locate(addr).is_none() {
                    return Err(SimError::InvariantViolation {
                        invariant: "I7",
                        addr,
                        detail: format!("host {} holds a line with no directory entry", host.id()),
                    });
                }
            }
        }
        Ok(())
    }
}
