//! The unique table: hash-consed interior nodes with one chained hash
//! table per level, so canonicity holds — no two distinct interior
//! nodes ever share the triple `(level, low, high)`.
//!
//! One subtable per variable, with independent growth and stats per
//! table, and separate chaining through each [`Node`]'s intrusive
//! `next` link rather than open addressing.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

use crate::edge::{Edge, NodeId, TERMINAL};
use crate::node::{Level, Node, Slot};

const INITIAL_BUCKETS: usize = 16;
const MAX_LOAD_FACTOR: f64 = 0.75;

#[inline]
fn hash_pair(low: Edge, high: Edge) -> u64 {
    let mut hasher = FxHasher::default();
    low.hash(&mut hasher);
    high.hash(&mut hasher);
    hasher.finish()
}

/// The chained hash table for a single level.
struct LevelTable {
    buckets: Vec<Option<NodeId>>,
    len: usize,
}

impl LevelTable {
    fn new() -> Self {
        LevelTable {
            buckets: vec![None; INITIAL_BUCKETS],
            len: 0,
        }
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }
}

/// Hash-consed node storage plus the generational arena backing every
/// [`NodeId`] in the manager.
pub(crate) struct UniqueTable {
    arena: Vec<Slot>,
    free_head: Option<NodeId>,
    levels: Vec<LevelTable>,
    live_nodes: usize,
    peak_nodes: usize,
    /// Nodes whose `ref_count` just dropped to zero, pending the next
    /// `crate::gc::sweep`. Populated by `decref`, drained by the sweep,
    /// which is what lets a single child-decref inside the sweep loop
    /// cascade into further collection without a separate scan.
    dead: Vec<NodeId>,
}

/// Outcome of [`UniqueTable::find_or_add`]: whether hash-consing found an
/// existing node (ref-count bookkeeping differs between the two cases,
/// see `crate::kernel::reduce`).
pub(crate) enum Lookup {
    /// `low == high`; no node involved, the edge is just one of the
    /// (now-redundant) children.
    Trivial(Edge),
    /// An existing node with this `(level, low, high)` triple was found.
    Found(Edge),
    /// A new node was allocated; its `ref_count` is `0` and the caller
    /// owns wiring it up.
    Created(Edge),
}

impl UniqueTable {
    pub(crate) fn new() -> Self {
        UniqueTable {
            arena: vec![Slot::Terminal],
            free_head: None,
            levels: Vec::new(),
            live_nodes: 0,
            peak_nodes: 0,
            dead: Vec::new(),
        }
    }

    /// Increment a node's reference count. A no-op on the terminal,
    /// which carries a permanent, untracked reference.
    pub(crate) fn incref(&mut self, e: Edge) {
        if !e.is_constant() {
            self.node_mut(e.node()).ref_count += 1;
        }
    }

    /// Decrement a node's reference count. Does not free the node
    /// immediately; it is only marked dead and left for sweep, queued
    /// for `crate::gc::sweep` once it reaches zero.
    pub(crate) fn decref(&mut self, e: Edge) {
        if e.is_constant() {
            return;
        }
        let id = e.node();
        let node = self.node_mut(id);
        debug_assert!(node.ref_count > 0, "ref count underflow on node {id}");
        node.ref_count -= 1;
        if node.ref_count == 0 {
            self.dead.push(id);
        }
    }

    /// Produce a fresh owned reference to the same function as `e`.
    pub(crate) fn clone_edge(&mut self, e: Edge) -> Edge {
        self.incref(e);
        e
    }

    /// Drain the pending dead-node queue for a GC sweep.
    pub(crate) fn take_dead(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.dead)
    }

    pub(crate) fn ensure_level(&mut self, level: Level) {
        let needed = level as usize + 1;
        if self.levels.len() < needed {
            self.levels.resize_with(needed, LevelTable::new);
        }
    }

    pub(crate) fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.arena[id as usize]
            .as_node()
            .expect("NodeId does not refer to a live interior node")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.arena[id as usize]
            .as_node_mut()
            .expect("NodeId does not refer to a live interior node")
    }

    /// The effective level of an edge: the terminal sorts above (i.e.
    /// numerically past) every variable level, so min-level comparisons
    /// treat it as "absent".
    pub(crate) fn level_of(&self, e: Edge) -> Level {
        if e.is_constant() {
            Level::MAX
        } else {
            self.node(e.node()).level
        }
    }

    pub(crate) fn live_node_count(&self) -> usize {
        self.live_nodes
    }

    pub(crate) fn peak_node_count(&self) -> usize {
        self.peak_nodes
    }

    /// Number of nodes hash-consed at `level`.
    pub(crate) fn level_node_count(&self, level: Level) -> usize {
        self.levels
            .get(level as usize)
            .map(|t| t.len)
            .unwrap_or(0)
    }

    pub(crate) fn total_bucket_capacity(&self) -> usize {
        self.levels.iter().map(|t| t.buckets.len()).sum()
    }

    /// Implements the three reductions in order: `low == high` collapse,
    /// complement-edge canonicalization on `high`, then hash-consed
    /// lookup/insertion.
    ///
    /// Does not touch reference counts; the caller (`crate::kernel::reduce`)
    /// decides how ownership of `low`/`high` transfers based on which
    /// [`Lookup`] variant comes back.
    pub(crate) fn find_or_add(&mut self, level: Level, low: Edge, high: Edge) -> Lookup {
        if low == high {
            return Lookup::Trivial(low);
        }

        let (low, high, tag) = if high.complement() {
            (low.negate(), high.negate(), true)
        } else {
            (low, high, false)
        };
        debug_assert!(!high.complement());

        self.ensure_level(level);
        let hash = hash_pair(low, high);
        let table = &self.levels[level as usize];
        let idx = table.bucket_index(hash);
        let mut cursor = table.buckets[idx];
        while let Some(id) = cursor {
            let node = self.node(id);
            if node.low == low && node.high == high {
                return Lookup::Found(Edge::new(id, tag));
            }
            cursor = node.next;
        }

        let id = self.alloc(Node::new(level, low, high, None));
        let table = &mut self.levels[level as usize];
        table.len += 1;
        if (table.len as f64) > (table.buckets.len() as f64) * MAX_LOAD_FACTOR {
            self.grow_level(level);
        }
        // Insertion must happen after any growth invalidated bucket
        // indices, so (re)compute the head pointer and link fresh.
        let table = &mut self.levels[level as usize];
        let idx = table.bucket_index(hash);
        let head = table.buckets[idx];
        self.node_mut(id).next = head;
        self.levels[level as usize].buckets[idx] = Some(id);

        Lookup::Created(Edge::new(id, tag))
    }

    /// Structural find-or-add that discards the created/found
    /// distinction, for callers (the reordering engine) that manage
    /// reference counts themselves rather than relying on
    /// `crate::kernel::reduce`'s ownership-transfer convention.
    pub(crate) fn find_or_add_edge(&mut self, level: Level, low: Edge, high: Edge) -> Edge {
        match self.find_or_add(level, low, high) {
            Lookup::Trivial(e) | Lookup::Found(e) | Lookup::Created(e) => e,
        }
    }

    /// All node ids currently hash-consed at `level`, in no particular
    /// order. Used by the reordering engine to enumerate the nodes an
    /// adjacent-level swap must rebuild.
    pub(crate) fn nodes_at_level(&self, level: Level) -> Vec<NodeId> {
        let Some(table) = self.levels.get(level as usize) else {
            return Vec::new();
        };
        let mut ids = Vec::with_capacity(table.len);
        for &head in &table.buckets {
            let mut cursor = head;
            while let Some(id) = cursor {
                ids.push(id);
                cursor = self.node(id).next;
            }
        }
        ids
    }

    /// Detach a node from its level's chain without freeing its arena
    /// slot, so its fields can be rewritten and it can be relinked at a
    /// (possibly different) bucket within the same level.
    pub(crate) fn detach_from_level(&mut self, id: NodeId, level: Level) {
        let (low, high) = {
            let n = self.node(id);
            (n.low, n.high)
        };
        let hash = hash_pair(low, high);
        let table = &mut self.levels[level as usize];
        let idx = table.bucket_index(hash);
        let mut cursor = table.buckets[idx];
        let mut prev: Option<NodeId> = None;
        while let Some(cur) = cursor {
            let next = self.node(cur).next;
            if cur == id {
                match prev {
                    Some(p) => self.node_mut(p).next = next,
                    None => self.levels[level as usize].buckets[idx] = next,
                }
                return;
            }
            prev = Some(cur);
            cursor = next;
        }
    }

    /// Overwrite a detached node's children in place (its level and
    /// `NodeId` stay fixed, so every existing edge that already points
    /// at it remains valid) and relink it into `level`'s chain at the
    /// bucket its new content hashes to.
    ///
    /// `high` must not carry the complement tag; the reordering engine
    /// is responsible for deriving it so that this always holds (see
    /// `crate::reorder`).
    pub(crate) fn rewrite_node(&mut self, id: NodeId, level: Level, low: Edge, high: Edge) {
        debug_assert!(!high.complement(), "node high edge must never be complemented");
        {
            let n = self.node_mut(id);
            n.low = low;
            n.high = high;
        }
        self.ensure_level(level);
        let hash = hash_pair(low, high);
        let table = &mut self.levels[level as usize];
        let idx = table.bucket_index(hash);
        let head = table.buckets[idx];
        self.node_mut(id).next = head;
        self.levels[level as usize].buckets[idx] = Some(id);
    }

    /// Look up `(level, low, high)` without creating anything (used by
    /// consistency checks and by the reordering engine's local rebuild
    /// step, which always expects to find-or-create anyway, but is handy
    /// for tests).
    #[cfg(test)]
    pub(crate) fn find(&self, level: Level, low: Edge, high: Edge) -> Option<Edge> {
        if low == high {
            return Some(low);
        }
        let (low, high, tag) = if high.complement() {
            (low.negate(), high.negate(), true)
        } else {
            (low, high, false)
        };
        let table = self.levels.get(level as usize)?;
        let hash = hash_pair(low, high);
        let mut cursor = table.buckets[table.bucket_index(hash)];
        while let Some(id) = cursor {
            let node = self.node(id);
            if node.low == low && node.high == high {
                return Some(Edge::new(id, tag));
            }
            cursor = node.next;
        }
        None
    }

    fn grow_level(&mut self, level: Level) {
        let old_len = self.levels[level as usize].buckets.len();
        let new_len = old_len * 2;
        let mut new_buckets: Vec<Option<NodeId>> = vec![None; new_len];

        // Re-chain every node currently hashed at this level.
        let mut ids = Vec::with_capacity(self.levels[level as usize].len);
        let mut cursor_bucket = 0usize;
        while cursor_bucket < old_len {
            let mut cursor = self.levels[level as usize].buckets[cursor_bucket];
            while let Some(id) = cursor {
                let next = self.node(id).next;
                ids.push(id);
                cursor = next;
            }
            cursor_bucket += 1;
        }
        for id in ids {
            let (low, high) = {
                let n = self.node(id);
                (n.low, n.high)
            };
            let hash = hash_pair(low, high);
            let idx = (hash as usize) & (new_len - 1);
            let head = new_buckets[idx];
            self.node_mut(id).next = head;
            new_buckets[idx] = Some(id);
        }
        self.levels[level as usize].buckets = new_buckets;
    }

    /// Remove a node from its level's bucket chain and its arena slot
    /// for the dead-node sweep. Does not touch children's ref counts;
    /// the caller (GC) cascades those.
    pub(crate) fn remove(&mut self, id: NodeId) {
        let (level, low, high) = {
            let n = self.node(id);
            (n.level, n.low, n.high)
        };
        let hash = hash_pair(low, high);
        let table = &mut self.levels[level as usize];
        let idx = table.bucket_index(hash);
        let mut cursor = table.buckets[idx];
        let mut prev: Option<NodeId> = None;
        while let Some(cur) = cursor {
            let next = self.node(cur).next;
            if cur == id {
                match prev {
                    Some(p) => self.node_mut(p).next = next,
                    None => self.levels[level as usize].buckets[idx] = next,
                }
                break;
            }
            prev = Some(cur);
            cursor = next;
        }
        self.levels[level as usize].len -= 1;
        self.free(id);
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = match self.free_head {
            Some(id) => {
                let next_free = match &self.arena[id as usize] {
                    Slot::Free { next_free } => *next_free,
                    _ => unreachable!("free list points at a non-free slot"),
                };
                self.free_head = next_free;
                self.arena[id as usize] = Slot::Occupied(node);
                id
            }
            None => {
                let id = self.arena.len() as NodeId;
                self.arena.push(Slot::Occupied(node));
                id
            }
        };
        self.live_nodes += 1;
        self.peak_nodes = self.peak_nodes.max(self.live_nodes);
        id
    }

    fn free(&mut self, id: NodeId) {
        debug_assert_ne!(id, TERMINAL, "the terminal is never freed");
        self.arena[id as usize] = Slot::Free {
            next_free: self.free_head,
        };
        self.free_head = Some(id);
        self.live_nodes -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: NodeId) -> Edge {
        Edge::new(n, false)
    }

    #[test]
    fn trivial_reduction_returns_the_shared_child() {
        let mut ut = UniqueTable::new();
        let e = lit(TERMINAL);
        match ut.find_or_add(0, e, e) {
            Lookup::Trivial(r) => assert_eq!(r, e),
            _ => panic!("expected Trivial"),
        }
        assert_eq!(ut.live_node_count(), 0);
    }

    #[test]
    fn hash_consing_returns_the_same_node_for_the_same_triple() {
        let mut ut = UniqueTable::new();
        let low = Edge::falsy();
        let high = Edge::truthy();
        let a = match ut.find_or_add(3, low, high) {
            Lookup::Created(e) => e,
            _ => panic!("expected Created"),
        };
        let b = match ut.find_or_add(3, low, high) {
            Lookup::Found(e) => e,
            other => panic!("expected Found, got a different variant: created={}", matches!(other, Lookup::Created(_))),
        };
        assert_eq!(a, b);
        assert_eq!(ut.live_node_count(), 1);
    }

    #[test]
    fn complemented_high_is_normalized_away() {
        let mut ut = UniqueTable::new();
        let low = Edge::truthy();
        let high = Edge::falsy(); // complemented terminal
        let e = match ut.find_or_add(0, low, high) {
            Lookup::Created(e) => e,
            _ => panic!("expected Created"),
        };
        // the stored node's high edge must never carry the complement bit
        assert!(!ut.node(e.node()).high.complement());
        assert!(e.complement());
    }

    #[test]
    fn grows_past_load_factor_without_losing_entries() {
        let mut ut = UniqueTable::new();
        let mut created = Vec::new();
        for i in 0..200u32 {
            let low = Edge::new(TERMINAL, false);
            let high = Edge::new(TERMINAL, true);
            // force distinct triples by varying level
            let level = i;
            match ut.find_or_add(level, low, high) {
                Lookup::Created(e) => created.push((level, e)),
                _ => panic!("expected Created"),
            }
        }
        for (level, e) in created {
            assert_eq!(ut.find(level, Edge::new(TERMINAL, false), Edge::new(TERMINAL, true)), Some(e));
        }
    }

    #[test]
    fn remove_detaches_from_chain_and_frees_slot() {
        let mut ut = UniqueTable::new();
        let low = Edge::falsy();
        let high = Edge::truthy();
        let e = match ut.find_or_add(1, low, high) {
            Lookup::Created(e) => e,
            _ => panic!("expected Created"),
        };
        ut.remove(e.node());
        assert_eq!(ut.find(1, low, high), None);
        assert_eq!(ut.live_node_count(), 0);

        // the freed slot is reused
        let low2 = Edge::truthy();
        let high2 = Edge::falsy().negate(); // still truthy but exercises a fresh triple
        let _ = ut.find_or_add(2, low2, high2);
    }
}
