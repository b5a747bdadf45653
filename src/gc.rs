//! Reference-counted garbage collection.
//!
//! Ownership discipline used throughout `crate::kernel`: a function
//! receives its arguments *borrowed* (it must not decref them) and
//! returns a freshly *owned* edge (its target's `ref_count` already
//! accounts for the value being handed back). The only place ownership
//! of a temporary is transferred into permanent storage is
//! [`crate::kernel::reduce`], which consumes its `low`/`high` arguments
//! and decides, based on whether hash-consing found an existing node,
//! whether that ownership moves into the new node's child slots (no
//! counting change) or must be released (`decref`) because the existing
//! node already owns its own children.
//!
//! Decrementing to zero never cascades synchronously; it only marks
//! the node dead. The cascade
//! happens here, in `sweep`, where removing a dead node's own decref of
//! its children can feed the very same worklist the sweep is draining.

use crate::apply_cache::ApplyCache;
use crate::unique_table::UniqueTable;

/// Collect and free every node whose reference count has reached zero,
/// cascading through their children, then invalidate the apply cache
/// (whose entries may reference nodes that just vanished).
///
/// Returns the number of nodes freed.
pub(crate) fn sweep(table: &mut UniqueTable, cache: &mut ApplyCache) -> usize {
    let mut removed = 0usize;
    loop {
        let batch = table.take_dead();
        if batch.is_empty() {
            break;
        }
        for id in batch {
            // A node can be queued more than once if several of its
            // parents died in the same sweep; only act the first time.
            if table.node(id).ref_count != 0 {
                continue;
            }
            let (low, high) = {
                let n = table.node(id);
                (n.low, n.high)
            };
            table.remove(id);
            removed += 1;
            table.decref(low);
            table.decref(high);
        }
    }
    if removed > 0 {
        log::debug!(
            "gc: swept {removed} node(s), {} live remaining, apply cache cleared",
            table.live_node_count()
        );
        cache.clear();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::unique_table::Lookup;

    #[test]
    fn sweep_cascades_through_a_chain_of_children() {
        let mut table = UniqueTable::new();
        let mut cache = ApplyCache::with_capacity(16);

        // level 2: leaf node over the terminal
        let leaf = match table.find_or_add(2, Edge::falsy(), Edge::truthy()) {
            Lookup::Created(e) => e,
            _ => panic!(),
        };
        table.incref(leaf); // the owning reference created by find_or_add's caller contract

        // level 1: parent pointing at leaf on both non-trivial children
        let parent = match table.find_or_add(1, Edge::falsy(), leaf) {
            Lookup::Created(e) => e,
            _ => panic!(),
        };
        table.incref(parent);
        // parent's creation transferred ownership of `leaf`'s temporary
        // edge into its high child slot; nothing further to do.

        assert_eq!(table.live_node_count(), 2);

        table.decref(parent); // drop the only external handle
        let freed = sweep(&mut table, &mut cache);
        assert_eq!(freed, 2, "parent and leaf should both be collected");
        assert_eq!(table.live_node_count(), 0);
    }

    #[test]
    fn live_node_survives_sweep() {
        let mut table = UniqueTable::new();
        let mut cache = ApplyCache::with_capacity(16);
        let n = match table.find_or_add(0, Edge::falsy(), Edge::truthy()) {
            Lookup::Created(e) => e,
            _ => panic!(),
        };
        table.incref(n);
        let freed = sweep(&mut table, &mut cache);
        assert_eq!(freed, 0);
        assert_eq!(table.live_node_count(), 1);
    }
}
