//! A direct-mapped, lossy memoization cache for the Apply/ITE kernel.
//!
//! A single flat table, index computed from a hash of the operator and
//! operands, no chaining. A collision silently evicts whatever was
//! there; that's deliberate; the kernel call that missed just
//! recomputes, so a wrong eviction costs time, never correctness.
//!
//! The cache does not hold reference-counted ownership of the nodes its
//! entries mention: a cached [`Edge`] can go stale the instant GC frees
//! the node behind it, which is why `crate::gc` clears this table
//! wholesale on every sweep rather than tracking individual entries.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

use crate::edge::Edge;

/// Which kernel operation an entry memoizes. Operators that depend on a
/// caller-supplied map (substitution, variable renaming) carry a
/// generation id so that two calls with different maps never collide on
/// stale results; `crate::manager` bumps the generation every time a new
/// map is installed.
/// `Level` is spelled out as `u32` here (rather than imported from
/// `crate::node`) to keep this module free of a dependency on the node
/// arena; the two types are the same.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Op {
    /// The universal ITE kernel; every binary connective reduces to
    /// this before it ever reaches the cache.
    Ite,
    /// Single-variable restriction, keyed by the level being fixed (the
    /// constant it's fixed to is folded into which cache lookup is made
    /// by the caller, not stored in the key).
    Restrict1(u32),
    /// Single-variable quantification, keyed by the eliminated level
    /// (see `crate::kernel::quant1`, used internally by `and_exist1`).
    Exist1(u32),
    Forall1(u32),
    Unique1(u32),
    /// Quantification over a set of variables encoded as a cube edge
    /// (see `crate::kernel::quant`); `f` and `g` are `(f, vars_cube)`.
    Exist,
    Forall,
    Unique,
    /// Fused `and` then single-variable `exist`, keyed by the
    /// eliminated level.
    AndExist(u32),
    /// Substitution keyed by a generation id the manager bumps every
    /// time a new substitution/rename map is installed, so that two
    /// calls with different maps never collide on a stale result
    /// (`crate::kernel::substitute`, single-variable `compose` and
    /// multi-variable `rename` all share this op code).
    Compose(u32),
    /// Coudert-Madre generalized cofactor (`crate::kernel::restrict`),
    /// keyed by `(f, care_set)`.
    RestrictCube,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct CacheKey {
    pub op: Op,
    pub f: Edge,
    pub g: Edge,
    pub h: Edge,
}

impl CacheKey {
    pub(crate) fn new(op: Op, f: Edge, g: Edge, h: Edge) -> Self {
        CacheKey { op, f, g, h }
    }
}

#[derive(Clone, Copy)]
struct Entry {
    key: CacheKey,
    result: Edge,
}

pub(crate) struct ApplyCache {
    slots: Vec<Option<Entry>>,
    lookups: u64,
    hits: u64,
    insertions: u64,
    collisions: u64,
    deletions: u64,
}

#[inline]
fn hash_key(key: &CacheKey) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

impl ApplyCache {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(16);
        ApplyCache {
            slots: vec![None; capacity],
            lookups: 0,
            hits: 0,
            insertions: 0,
            collisions: 0,
            deletions: 0,
        }
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash as usize) & (self.slots.len() - 1)
    }

    /// Look up a memoized result. Returns a raw (not freshly owned)
    /// edge; the caller is responsible for `clone_edge`-ing it into an
    /// owned reference before returning it onward.
    pub(crate) fn get(&mut self, key: &CacheKey) -> Option<Edge> {
        self.lookups += 1;
        let idx = self.index(hash_key(key));
        match &self.slots[idx] {
            Some(entry) if entry.key == *key => {
                self.hits += 1;
                Some(entry.result)
            }
            _ => None,
        }
    }

    pub(crate) fn insert(&mut self, key: CacheKey, result: Edge) {
        let idx = self.index(hash_key(&key));
        self.insertions += 1;
        if let Some(existing) = &self.slots[idx] {
            if existing.key != key {
                self.collisions += 1;
            }
        }
        self.slots[idx] = Some(Entry { key, result });
    }

    /// Drop every entry. Called by `crate::gc` after a sweep, since
    /// swept nodes may appear anywhere among cached results.
    pub(crate) fn clear(&mut self) {
        let live = self.slots.iter().filter(|s| s.is_some()).count();
        self.deletions += live as u64;
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn used(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn lookups(&self) -> u64 {
        self.lookups
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits
    }

    pub(crate) fn insertions(&self) -> u64 {
        self.insertions
    }

    pub(crate) fn collisions(&self) -> u64 {
        self.collisions
    }

    pub(crate) fn deletions(&self) -> u64 {
        self.deletions
    }

    /// Hit rate as a percentage, `100.0` when nothing has been looked up
    /// yet (matches `Stats::cache_hit_rate`).
    pub(crate) fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            100.0
        } else {
            100.0 * (self.hits as f64) / (self.lookups as f64)
        }
    }

    /// Double the table size, dropping every entry (their slot indices
    /// are no longer valid under the new mask, and re-hashing is not
    /// worth the complexity for a cache that's lossy by design anyway).
    pub(crate) fn grow(&mut self) {
        let new_capacity = self.slots.len() * 2;
        self.slots = vec![None; new_capacity];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::TERMINAL;

    fn e(n: u32, c: bool) -> Edge {
        Edge::new(n, c)
    }

    #[test]
    fn miss_then_hit() {
        let mut cache = ApplyCache::with_capacity(16);
        let key = CacheKey::new(Op::Ite, e(1, false), e(2, false), e(TERMINAL, false));
        assert_eq!(cache.get(&key), None);
        cache.insert(key, e(3, false));
        assert_eq!(cache.get(&key), Some(e(3, false)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.lookups(), 2);
    }

    #[test]
    fn distinct_generations_do_not_collide_semantically() {
        let mut cache = ApplyCache::with_capacity(16);
        let k1 = CacheKey::new(Op::Compose(1), e(1, false), e(2, false), e(TERMINAL, false));
        let k2 = CacheKey::new(Op::Compose(2), e(1, false), e(2, false), e(TERMINAL, false));
        cache.insert(k1, e(5, false));
        cache.insert(k2, e(6, false));
        // whichever is still resident must match its own key exactly
        if let Some(r) = cache.get(&k1) {
            assert_eq!(r, e(5, false));
        }
    }

    #[test]
    fn clear_counts_deletions_and_empties_table() {
        let mut cache = ApplyCache::with_capacity(16);
        let key = CacheKey::new(Op::Ite, e(1, false), e(2, false), e(TERMINAL, false));
        cache.insert(key, e(3, false));
        cache.clear();
        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.deletions(), 1);
    }

    #[test]
    fn hit_rate_with_no_lookups_is_100() {
        let cache = ApplyCache::with_capacity(16);
        assert_eq!(cache.hit_rate(), 100.0);
    }
}
