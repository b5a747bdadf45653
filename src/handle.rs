//! The safe reference-counted handle: the only way user code ever
//! touches a [`crate::edge::Edge`]. A `Bdd` owns exactly one reference on
//! its edge's node; `Clone` increments, `Drop` decrements, while keeping
//! the raw `Edge` type crate-private. Chaining reads naturally, e.g.
//! `x1.and(&x0)?.not()?`.
//!
//! Because a `Bdd` holds an `Rc` to the same `ManagerInner` every other
//! handle from that manager holds, the manager cannot be dropped while
//! any `Bdd` survives: a handle outliving its manager is statically
//! impossible rather than a runtime check.

use std::fmt;

use crate::edge::Edge;
use crate::error::Result;
use crate::manager::{Manager, VarId};

/// A reference-counted handle to a Boolean function represented as a
/// BDD. Equality compares edges (after checking both handles come from
/// the same manager): under the engine's canonicity invariant, two
/// handles are equal iff they denote the same function.
pub struct Bdd {
    manager: Manager,
    edge: Edge,
}

impl Bdd {
    /// Wrap a *borrowed* edge, minting a fresh owned reference for this
    /// handle (the edge's ref count is incremented here).
    pub(crate) fn from_edge(manager: Manager, edge: Edge) -> Self {
        manager.incref_for_handle(edge);
        Bdd { manager, edge }
    }

    /// Wrap an edge whose ref count the caller already accounted for
    /// (the common case: kernel ops return an owned edge), avoiding a
    /// redundant incref/decref round trip.
    pub(crate) fn from_owned_edge(manager: Manager, edge: Edge) -> Self {
        Bdd { manager, edge }
    }

    pub(crate) fn edge(&self) -> Edge {
        self.edge
    }

    pub(crate) fn manager(&self) -> Manager {
        self.manager.clone()
    }

    /// Whether this handle denotes the constant `TRUE`.
    pub fn is_true(&self) -> bool {
        self.edge.is_true()
    }

    /// Whether this handle denotes the constant `FALSE`.
    pub fn is_false(&self) -> bool {
        self.edge.is_false()
    }

    /// A stable opaque integer identifying the underlying node, valid
    /// only while some handle to it (this one or a clone) is alive.
    pub fn to_opaque(&self) -> u64 {
        self.edge.to_opaque()
    }

    // -- chaining convenience methods, routing to the kernel via the
    // owning manager --

    pub fn not(&self) -> Result<Bdd> {
        self.manager.not(self)
    }
    pub fn and(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.and(self, other)
    }
    pub fn or(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.or(self, other)
    }
    pub fn xor(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.xor(self, other)
    }
    pub fn nand(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.nand(self, other)
    }
    pub fn nor(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.nor(self, other)
    }
    pub fn implies(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.implies(self, other)
    }
    pub fn imp_strict(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.imp_strict(self, other)
    }
    pub fn equiv(&self, other: &Bdd) -> Result<Bdd> {
        self.manager.equiv(self, other)
    }
    pub fn ite(&self, then: &Bdd, els: &Bdd) -> Result<Bdd> {
        self.manager.ite(self, then, els)
    }
    pub fn exists(&self, vars: &[VarId]) -> Result<Bdd> {
        self.manager.exists(vars, self)
    }
    pub fn forall(&self, vars: &[VarId]) -> Result<Bdd> {
        self.manager.forall(vars, self)
    }
    pub fn unique(&self, vars: &[VarId]) -> Result<Bdd> {
        self.manager.unique(vars, self)
    }
    pub fn and_exists(&self, vars: &[VarId], other: &Bdd) -> Result<Bdd> {
        self.manager.and_exists(vars, self, other)
    }
    pub fn compose(&self, var: VarId, g: &Bdd) -> Result<Bdd> {
        self.manager.compose(self, var, g)
    }
    pub fn rename(&self, mapping: &[(VarId, VarId)]) -> Result<Bdd> {
        self.manager.rename(self, mapping)
    }
    pub fn restrict(&self, care: &Bdd) -> Result<Bdd> {
        self.manager.restrict(self, care)
    }
    pub fn cofactor(&self, assignment: &[(VarId, bool)]) -> Result<Bdd> {
        self.manager.cofactor(self, assignment)
    }
    pub fn eval(&self, assignment: &[(VarId, bool)]) -> Result<bool> {
        self.manager.eval(self, assignment)
    }
    pub fn sat_count(&self) -> Result<num_bigint::BigUint> {
        self.manager.sat_count(self)
    }
    pub fn support(&self) -> Result<Vec<VarId>> {
        self.manager.support(self)
    }
    pub fn pick_cube(&self) -> Result<Option<Vec<(VarId, Option<bool>)>>> {
        self.manager.pick_cube(self)
    }
    pub fn models(&self, care_vars: &[VarId]) -> Result<Vec<Vec<bool>>> {
        self.manager.models(self, care_vars)
    }
}

impl Clone for Bdd {
    fn clone(&self) -> Self {
        self.manager.incref_for_handle(self.edge);
        Bdd {
            manager: self.manager.clone(),
            edge: self.edge,
        }
    }
}

impl Drop for Bdd {
    fn drop(&mut self) {
        self.manager.decref_for_handle(self.edge);
    }
}

impl PartialEq for Bdd {
    fn eq(&self, other: &Self) -> bool {
        self.manager.is_same_manager(&other.manager) && self.edge == other.edge
    }
}
impl Eq for Bdd {}

impl fmt::Debug for Bdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bdd({:?})", self.edge)
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::Manager;

    #[test]
    fn clone_and_drop_keep_the_node_alive_until_the_last_handle_goes() {
        let m = Manager::new();
        let ids = m.declare(&["x", "y"]).unwrap();
        let vx = m.var(ids[0]).unwrap();
        let vy = m.var(ids[1]).unwrap();
        let f = m.and(&vx, &vy).unwrap();
        let g = f.clone();
        drop(f);
        assert!(g.eval(&[(ids[0], true), (ids[1], true)]).unwrap());
    }

    #[test]
    fn equality_is_pointer_equality_on_canonical_edges() {
        let m = Manager::new();
        let ids = m.declare(&["x", "y"]).unwrap();
        let vx = m.var(ids[0]).unwrap();
        let vy = m.var(ids[1]).unwrap();
        let f = m.implies(&vx, &vy).unwrap();
        let nx = m.not(&vx).unwrap();
        let g = m.or(&nx, &vy).unwrap();
        assert_eq!(f, g);
    }

    #[test]
    fn handles_from_different_managers_are_never_equal() {
        let m1 = Manager::new();
        let m2 = Manager::new();
        let ids1 = m1.declare(&["x"]).unwrap();
        let ids2 = m2.declare(&["x"]).unwrap();
        let v1 = m1.var(ids1[0]).unwrap();
        let v2 = m2.var(ids2[0]).unwrap();
        assert_ne!(v1, v2);
    }
}
