//! A set-associative store of arbitrary per-line values, keyed by address.
//!
//! Modeled on the teacher's `SetAssociativeCache`, but generalized: instead
//! of a presence-only `LruCache<u64, ()>` per set, each set holds whatever
//! value the caller needs attached to a line (a directory entry, or nothing
//! at all for a plain host cache). Capacity is never silently exceeded —
//! `install` panics if called on a full set without a prior eviction, so
//! callers are forced through the `victim` / evict / retry two-step.

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::types::Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub tag: u64,
    pub set: usize,
}

#[derive(Clone)]
pub struct SetAssociativeStore<V> {
    sets: Vec<LruCache<u64, V>>,
    line_size: u64,
    num_sets: usize,
}

impl<V> SetAssociativeStore<V> {
    pub fn new(line_size: u64, num_sets: usize, assoc: usize) -> Self {
        assert!(line_size.is_power_of_two(), "line size must be a power of two");
        assert!(num_sets > 0 && assoc > 0, "num_sets and assoc must be nonzero");
        let sets = (0..num_sets)
            .map(|_| LruCache::new(NonZeroUsize::new(assoc).unwrap()))
            .collect();
        SetAssociativeStore {
            sets,
            line_size,
            num_sets,
        }
    }

    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    pub fn split(&self, addr: Addr) -> Split {
        let line = addr / self.line_size;
        let set = (line % self.num_sets as u64) as usize;
        let tag = line / self.num_sets as u64;
        Split { tag, set }
    }

    fn addr_of(&self, tag: u64, set: usize) -> Addr {
        (tag * self.num_sets as u64 + set as u64) * self.line_size
    }

    pub fn contains(&self, addr: Addr) -> bool {
        let Split { tag, set } = self.split(addr);
        self.sets[set].contains(&tag)
    }

    pub fn is_full(&self, set: usize) -> bool {
        self.sets[set].len() >= self.sets[set].cap().get()
    }

    pub fn lookup(&self, addr: Addr) -> Option<&V> {
        let Split { tag, set } = self.split(addr);
        self.sets[set].peek(&tag)
    }

    /// Promotes `addr` to most-recently-used. Returns whether it was present.
    pub fn touch(&mut self, addr: Addr) -> bool {
        let Split { tag, set } = self.split(addr);
        self.sets[set].get(&tag).is_some()
    }

    /// Installs or overwrites the value at `addr`. Overwriting an already
    /// present line never grows the set, so it's always safe; installing a
    /// brand-new line into a full set is a programmer error — the caller
    /// should have evicted via `victim` first.
    pub fn install(&mut self, addr: Addr, value: V) {
        let Split { tag, set } = self.split(addr);
        if !self.sets[set].contains(&tag) && self.is_full(set) {
            panic!("install called on a full set without a prior eviction");
        }
        self.sets[set].put(tag, value);
    }

    /// Returns the address of the LRU line in `set`, without evicting it.
    pub fn victim(&self, set: usize) -> Option<Addr> {
        self.sets[set]
            .peek_lru()
            .map(|(&tag, _)| self.addr_of(tag, set))
    }

    pub fn remove(&mut self, addr: Addr) -> Option<V> {
        let Split { tag, set } = self.split(addr);
        self.sets[set].pop(&tag)
    }

    /// Every resident `(addr, value)` pair, in no particular order. Used
    /// only by the invariant checker, which needs to see every line.
    pub fn iter(&self) -> impl Iterator<Item = (Addr, &V)> + '_ {
        self.sets.iter().enumerate().flat_map(move |(set, cache)| {
            cache.iter().map(move |(&tag, value)| (self.addr_of(tag, set), value))
        })
    }

    /// Allocates space for `addr` if it isn't already present. Returns
    /// `None` on success (present or newly installed), or `Some(victim)`
    /// if the set is full and the caller must evict before retrying.
    pub fn allocate(&mut self, addr: Addr, make_value: impl FnOnce() -> V) -> Option<Addr> {
        if self.touch(addr) {
            return None;
        }
        let set = self.split(addr).set;
        if self.is_full(set) {
            return self.victim(set);
        }
        self.install(addr, make_value());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_stable_and_distributes_across_sets() {
        let store: SetAssociativeStore<()> = SetAssociativeStore::new(64, 4, 2);
        let a = store.split(0x1000);
        let b = store.split(0x1000);
        assert_eq!(a, b);
        assert!(a.set < 4);
    }

    #[test]
    fn allocate_then_full_set_reports_victim_without_evicting() {
        let mut store: SetAssociativeStore<()> = SetAssociativeStore::new(64, 1, 2);
        assert_eq!(store.allocate(0, || ()), None);
        assert_eq!(store.allocate(64, || ()), None);
        // Set now holds two lines at 2-way associativity: full.
        let victim = store.allocate(2 * 64, || ());
        assert_eq!(victim, Some(0));
        // Nothing was evicted or installed by the failed allocate.
        assert!(store.contains(0));
        assert!(!store.contains(2 * 64));
    }

    #[test]
    fn touch_promotes_lru_order() {
        let mut store: SetAssociativeStore<()> = SetAssociativeStore::new(64, 1, 2);
        store.install(0, ());
        store.install(64, ());
        store.touch(0);
        // 1*64 is now LRU since 0*64 was just touched.
        assert_eq!(store.victim(0), Some(64));
    }

    #[test]
    fn allocate_is_noop_for_already_present_address() {
        let mut store: SetAssociativeStore<()> = SetAssociativeStore::new(64, 1, 1);
        assert_eq!(store.allocate(0, || ()), None);
        assert_eq!(store.allocate(0, || ()), None);
        assert!(store.contains(0));
    }

    #[test]
    fn remove_clears_the_line() {
        let mut store: SetAssociativeStore<i32> = SetAssociativeStore::new(64, 2, 1);
        store.install(0, 7);
        assert_eq!(store.remove(0), Some(7));
        assert_eq!(store.remove(0), None);
    }

    #[test]
    #[should_panic(expected = "full set")]
    fn install_on_full_set_without_eviction_panics() {
        let mut store: SetAssociativeStore<()> = SetAssociativeStore::new(64, 1, 1);
        store.install(0, ());
        store.install(64, ());
    }
}
