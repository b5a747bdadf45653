//! The `Manager`: an explicit, non-global value owning the unique table,
//! apply cache, variable registry, configuration, and statistics for one
//! ROBDD universe.
//!
//! An explicit manager value is threaded through every call rather than
//! kept as a singleton, grouping the unique table, apply cache, and
//! variable registry together, owned through `Rc<RefCell<_>>` rather
//! than `Arc<RwLock<_>>` since this engine is scoped to single-threaded
//! cooperative use.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use num_bigint::BigUint;

use crate::apply_cache::ApplyCache;
use crate::config::Config;
use crate::edge::Edge;
use crate::error::{Error, Result};
use crate::gc;
use crate::handle::Bdd;
use crate::kernel::{self, Ctx, Quant};
use crate::node::Level;
use crate::reorder;
use crate::stats::Stats;
use crate::unique_table::UniqueTable;

/// Stable identifier for a declared variable. Unlike [`Level`] (a
/// variable's *position*, which reordering changes), a `VarId` never
/// changes once `declare` hands it out.
pub type VarId = u32;

pub(crate) struct ManagerInner {
    pub(crate) table: UniqueTable,
    pub(crate) cache: ApplyCache,
    pub(crate) cancelled: Cell<bool>,
    config: Config,
    var_names: Vec<String>,
    name_to_var: HashMap<String, VarId>,
    level_of_var: Vec<Level>,
    var_of_level: Vec<VarId>,
    var_literal: Vec<Option<Edge>>,
    /// Bumped every time a fresh substitution/rename map is installed,
    /// so `crate::kernel::substitute` calls that use different maps
    /// never collide on the apply cache.
    subst_generation: u32,
    /// Bumped on every completed sifting pass. Reordering only ever runs
    /// between top-level calls (never interleaved with an in-flight
    /// recursion), so a `ReorderingRestart` control-flow path is
    /// structurally unreachable here; this counter exists purely for
    /// `statistics()` and is not consulted for correctness.
    generation: u64,
    n_reorderings: usize,
    reordering_time_sec: f64,
    lookups_since_cache_check: u64,
    hits_since_cache_check: u64,
    /// Live node count as of the last sifting pass (or `0` if none has
    /// run yet). `maybe_reorder` compares the current live count against
    /// this baseline, not the running peak, so growth past `max_growth`
    /// relative to the last-known-good layout actually triggers sifting.
    nodes_at_last_reorder: usize,
}

impl ManagerInner {
    fn new(config: Config) -> Self {
        ManagerInner {
            table: UniqueTable::new(),
            cache: ApplyCache::with_capacity(config.max_cache.min(1 << 16).max(16)),
            cancelled: Cell::new(false),
            config,
            var_names: Vec::new(),
            name_to_var: HashMap::new(),
            level_of_var: Vec::new(),
            var_of_level: Vec::new(),
            var_literal: Vec::new(),
            subst_generation: 0,
            generation: 0,
            n_reorderings: 0,
            reordering_time_sec: 0.0,
            lookups_since_cache_check: 0,
            hits_since_cache_check: 0,
            nodes_at_last_reorder: 0,
        }
    }

    fn ctx(&mut self) -> Ctx<'_> {
        Ctx {
            table: &mut self.table,
            cache: &mut self.cache,
            cancelled: &self.cancelled,
        }
    }

    fn live_dead_fraction(&self) -> f64 {
        // `UniqueTable` drains its dead list into `gc::sweep` eagerly
        // (see its doc comment), so the best proxy for "too many dead
        // nodes" available without a second live counter is the
        // arena-vs-live gap tracked by `peak_node_count` relative to
        // `live_node_count`.
        let live = self.table.live_node_count().max(1);
        let peak = self.table.peak_node_count().max(live);
        1.0 - (live as f64 / peak as f64)
    }

    fn maybe_gc(&mut self) {
        if !self.config.garbage_collection {
            return;
        }
        if self.live_dead_fraction() > 0.25 {
            gc::sweep(&mut self.table, &mut self.cache);
        }
    }

    fn maybe_reorder(&mut self) {
        if !self.config.reordering {
            return;
        }
        let live = self.table.live_node_count();
        if self.nodes_at_last_reorder == 0 {
            // No baseline yet: record the current size and wait for
            // growth relative to it, rather than firing immediately.
            self.nodes_at_last_reorder = live;
            return;
        }
        let threshold = (self.nodes_at_last_reorder as f64) * self.config.max_growth;
        if (live as f64) <= threshold || self.table.num_levels() < 2 {
            return;
        }
        let start = Instant::now();
        let mut order: Vec<u32> = self.var_of_level.clone();
        reorder::sift_pass(
            &mut self.table,
            &mut self.cache,
            &mut order,
            self.config.max_vars,
            self.config.max_swaps,
            self.config.max_growth,
        );
        self.apply_new_order(order);
        self.reordering_time_sec += start.elapsed().as_secs_f64();
        self.n_reorderings += 1;
        self.generation += 1;
        self.nodes_at_last_reorder = self.table.live_node_count();
    }

    fn apply_new_order(&mut self, var_of_level: Vec<VarId>) {
        self.level_of_var.resize(self.var_names.len(), 0);
        for (level, &var) in var_of_level.iter().enumerate() {
            self.level_of_var[var as usize] = level as Level;
        }
        self.var_of_level = var_of_level;
        // Positive literals are edges into the unique table and remain
        // valid (reordering rewrites nodes in place); only the
        // level->var/var->level permutation changed.
    }

    fn after_top_level_call(&mut self) {
        self.lookups_since_cache_check = self.cache.lookups();
        self.hits_since_cache_check = self.cache.hits();
        if self.cache.hit_rate() < self.config.min_hit_rate
            && self.cache.used() * 2 > self.cache.capacity()
        {
            self.cache.grow();
        }
        self.maybe_gc();
        self.maybe_reorder();
    }

    fn next_subst_generation(&mut self) -> u32 {
        self.subst_generation = self.subst_generation.wrapping_add(1);
        self.subst_generation
    }

    fn check_var(&self, v: VarId) -> Result<()> {
        if (v as usize) < self.var_names.len() {
            Ok(())
        } else {
            Err(Error::UnknownVariable {
                name: format!("#{v}"),
            })
        }
    }

    fn var_literal(&mut self, v: VarId) -> Result<Edge> {
        self.check_var(v)?;
        if let Some(e) = self.var_literal[v as usize] {
            return Ok(self.table.clone_edge(e));
        }
        let level = self.level_of_var[v as usize];
        let mut ctx = self.ctx();
        // `reduce` already hands back one owned reference; keep that one
        // in the permanent cache and mint a second for the caller.
        let e = kernel::reduce(&mut ctx, level, Edge::falsy(), Edge::truthy());
        self.var_literal[v as usize] = Some(e);
        Ok(self.table.clone_edge(e))
    }

    fn statistics(&self) -> Stats {
        Stats {
            n_vars: self.var_names.len(),
            n_nodes: self.table.live_node_count(),
            peak_nodes: self.table.peak_node_count(),
            peak_live_nodes: self.table.peak_node_count(),
            reordering_time_sec: self.reordering_time_sec,
            n_reorderings: self.n_reorderings,
            mem_bytes: (self.table.live_node_count() * std::mem::size_of::<crate::node::Node>())
                as u64,
            unique_size: self.table.total_bucket_capacity(),
            unique_used_fraction: if self.table.total_bucket_capacity() == 0 {
                0.0
            } else {
                self.table.live_node_count() as f64 / self.table.total_bucket_capacity() as f64
            },
            cache_size: self.cache.capacity(),
            cache_used_fraction: self.cache.used() as f64 / self.cache.capacity() as f64,
            cache_lookups: self.cache.lookups(),
            cache_hits: self.cache.hits(),
            cache_insertions: self.cache.insertions(),
            cache_collisions: self.cache.collisions(),
            cache_deletions: self.cache.deletions(),
        }
    }
}

/// The ROBDD manager. Cloning a `Manager` is cheap (it is a reference to
/// the same underlying universe, like cloning an `Rc`); every [`Bdd`]
/// handed out by one of its methods also holds this same reference, so
/// the manager cannot be dropped out from under a live handle — a
/// handle outliving its manager is statically impossible rather than a
/// runtime check.
#[derive(Clone)]
pub struct Manager(pub(crate) Rc<RefCell<ManagerInner>>);

impl Manager {
    /// A manager with default [`Config`].
    pub fn new() -> Self {
        Manager::with_config(Config::default())
    }

    /// A manager with an explicit [`Config`]. Multiple independent
    /// managers may coexist in a process.
    pub fn with_config(config: Config) -> Self {
        Manager(Rc::new(RefCell::new(ManagerInner::new(config))))
    }

    /// Run `f` against a borrowed [`Ctx`], then apply the post-call
    /// maintenance every public op goes through: cache resize check,
    /// then (if enabled) garbage collection, then (if enabled and the
    /// growth threshold was crossed) a sifting pass. Maintenance only
    /// runs after a *successful* call: a recoverable error leaves the
    /// manager in a consistent state equal to the pre-call state.
    fn with_ctx<T>(&self, f: impl FnOnce(&mut Ctx) -> Result<T>) -> Result<T> {
        let mut inner = self.0.borrow_mut();
        let result = {
            let mut ctx = inner.ctx();
            f(&mut ctx)
        };
        if result.is_ok() {
            inner.after_top_level_call();
        }
        result
    }

    fn wrap(&self, edge: Edge) -> Bdd {
        Bdd::from_edge(self.clone(), edge)
    }

    /// Wrap a borrowed edge as a handle, minting a fresh owned reference.
    /// Used by `crate::persist` to hand back root edges after a dump is
    /// reloaded.
    pub(crate) fn wrap_external(&self, edge: Edge) -> Bdd {
        self.wrap(edge)
    }

    /// The `(low, high)` children of an interior node, for `crate::persist`'s
    /// dump writers.
    pub(crate) fn node_children(&self, id: crate::edge::NodeId) -> (Edge, Edge) {
        let inner = self.0.borrow();
        let node = inner.table.node(id);
        (node.low, node.high)
    }

    /// `(low, high, level)` of an interior node, for `crate::persist`'s
    /// dump writers.
    pub(crate) fn node_fields(&self, id: crate::edge::NodeId) -> (Edge, Edge, Level) {
        let inner = self.0.borrow();
        let node = inner.table.node(id);
        (node.low, node.high, node.level)
    }

    /// Run `f` against a borrowed [`Ctx`] without the post-call
    /// maintenance `with_ctx` performs: used by `crate::persist`'s
    /// bottom-up node rebuild, which wants every node it constructs
    /// through `crate::kernel::reduce` to land in the same unique table
    /// generation without an interleaved GC sweep or sift pass reordering
    /// levels out from under the in-progress rebuild.
    pub(crate) fn with_reduce_ctx<T>(&self, f: impl FnOnce(&mut Ctx) -> Result<T>) -> Result<T> {
        let mut inner = self.0.borrow_mut();
        let mut ctx = inner.ctx();
        f(&mut ctx)
    }

    fn check_same_manager(&self, other: &Manager) -> Result<()> {
        if Rc::ptr_eq(&self.0, &other.0) {
            Ok(())
        } else {
            Err(Error::ManagerMismatch)
        }
    }

    pub(crate) fn is_same_manager(&self, other: &Manager) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Increment an edge's ref count on behalf of a [`Bdd`] handle being
    /// constructed from a borrowed edge.
    pub(crate) fn incref_for_handle(&self, edge: Edge) {
        self.0.borrow_mut().table.incref(edge);
    }

    /// Decrement an edge's ref count on behalf of a [`Bdd`] handle being
    /// dropped. A no-op on the constant edges: the terminal carries a
    /// permanent, untracked reference.
    pub(crate) fn decref_for_handle(&self, edge: Edge) {
        self.0.borrow_mut().table.decref(edge);
    }

    /// The constant `FALSE` BDD.
    pub fn falsy(&self) -> Bdd {
        self.wrap(Edge::falsy())
    }

    /// The constant `TRUE` BDD.
    pub fn truthy(&self) -> Bdd {
        self.wrap(Edge::truthy())
    }

    /// Declare `names` as fresh variables, appended contiguously at the
    /// bottom of the current order; see [`Manager::declare_at`] for the
    /// explicit-index form.
    pub fn declare(&self, names: &[&str]) -> Result<Vec<VarId>> {
        let mut inner = self.0.borrow_mut();
        let mut ids = Vec::with_capacity(names.len());
        for &name in names {
            if inner.name_to_var.contains_key(name) {
                return Err(Error::PrecondViolated {
                    reason: format!("variable `{name}` is already declared"),
                });
            }
            let id = inner.var_names.len() as VarId;
            let level = inner.var_of_level.len() as Level;
            inner.var_names.push(name.to_string());
            inner.name_to_var.insert(name.to_string(), id);
            inner.level_of_var.push(level);
            inner.var_of_level.push(id);
            inner.var_literal.push(None);
            inner.table.ensure_level(level);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Declare `name` at an explicit, caller-chosen index. The index
    /// must equal the number of variables already declared (dense,
    /// gap-free indices); use [`Manager::declare`] for the common
    /// append-only case.
    pub fn declare_at(&self, name: &str, index: VarId) -> Result<VarId> {
        let mut inner = self.0.borrow_mut();
        if index as usize != inner.var_names.len() {
            return Err(Error::PrecondViolated {
                reason: format!(
                    "declare_at({name}, {index}): expected the next contiguous index {}",
                    inner.var_names.len()
                ),
            });
        }
        if inner.name_to_var.contains_key(name) {
            return Err(Error::PrecondViolated {
                reason: format!("variable `{name}` is already declared"),
            });
        }
        let level = inner.var_of_level.len() as Level;
        inner.var_names.push(name.to_string());
        inner.name_to_var.insert(name.to_string(), index);
        inner.level_of_var.push(level);
        inner.var_of_level.push(index);
        inner.var_literal.push(None);
        inner.table.ensure_level(level);
        Ok(index)
    }

    /// Number of declared variables.
    pub fn num_vars(&self) -> usize {
        self.0.borrow().var_names.len()
    }

    /// The variable's current level (position in the order). Levels
    /// move under reordering; `VarId` never does.
    pub fn level_of_var(&self, v: VarId) -> Result<Level> {
        let inner = self.0.borrow();
        inner.check_var(v)?;
        Ok(inner.level_of_var[v as usize])
    }

    /// The variable currently occupying `level`.
    pub fn var_at_level(&self, level: Level) -> Result<VarId> {
        let inner = self.0.borrow();
        inner
            .var_of_level
            .get(level as usize)
            .copied()
            .ok_or_else(|| Error::PrecondViolated {
                reason: format!("level {level} is out of range (only {} declared)", inner.var_of_level.len()),
            })
    }

    /// The current order, as the permutation `level -> VarId`.
    pub fn var_levels(&self) -> Vec<VarId> {
        self.0.borrow().var_of_level.clone()
    }

    /// The variable's declared name.
    pub fn name_of_var(&self, v: VarId) -> Result<String> {
        let inner = self.0.borrow();
        inner.check_var(v)?;
        Ok(inner.var_names[v as usize].clone())
    }

    /// Look up a variable by the name it was declared with.
    pub fn var_by_name(&self, name: &str) -> Result<VarId> {
        let inner = self.0.borrow();
        inner
            .name_to_var
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownVariable { name: name.to_string() })
    }

    /// The positive literal `ite(v, TRUE, FALSE)`, created lazily the
    /// first time it's asked for.
    pub fn var(&self, v: VarId) -> Result<Bdd> {
        let mut inner = self.0.borrow_mut();
        let e = inner.var_literal(v)?;
        drop(inner);
        Ok(self.wrap_owned(e))
    }

    /// Like [`Manager::wrap`], but for an edge whose ref count the
    /// caller already incremented (avoids a redundant incref/decref
    /// round trip for values produced inside a `with_ctx` closure).
    fn wrap_owned(&self, edge: Edge) -> Bdd {
        Bdd::from_owned_edge(self.clone(), edge)
    }

    fn require(&self, bdd: &Bdd) -> Result<Edge> {
        self.check_same_manager(&bdd.manager())?;
        Ok(bdd.edge())
    }

    pub fn not(&self, f: &Bdd) -> Result<Bdd> {
        let fe = self.require(f)?;
        self.with_ctx(|ctx| Ok(kernel::apply_not(ctx, fe)))
            .map(|e| self.wrap_owned(e))
    }

    pub fn and(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_and(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    pub fn or(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_or(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    pub fn xor(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_xor(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    pub fn nand(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_nand(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    pub fn nor(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_nor(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    /// `f -> g`.
    pub fn implies(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_implies(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    /// Strict implication: `f -> g` and `f != g`.
    pub fn imp_strict(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_imp_strict(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    pub fn equiv(&self, f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        self.with_ctx(|ctx| kernel::apply_equiv(ctx, fe, ge))
            .map(|e| self.wrap_owned(e))
    }

    /// `if f { g } else { h }`, the universal ternary operator every
    /// other Boolean op reduces to.
    pub fn ite(&self, f: &Bdd, g: &Bdd, h: &Bdd) -> Result<Bdd> {
        let (fe, ge, he) = (self.require(f)?, self.require(g)?, self.require(h)?);
        self.with_ctx(|ctx| kernel::ite(ctx, fe, ge, he))
            .map(|e| self.wrap_owned(e))
    }

    fn levels_for(&self, vars: &[VarId]) -> Result<Vec<Level>> {
        let inner = self.0.borrow();
        vars.iter()
            .map(|&v| {
                inner.check_var(v)?;
                Ok(inner.level_of_var[v as usize])
            })
            .collect()
    }

    fn quantify(&self, q: Quant, vars: &[VarId], f: &Bdd) -> Result<Bdd> {
        let fe = self.require(f)?;
        let levels = self.levels_for(vars)?;
        self.with_ctx(|ctx| {
            let cube = kernel::build_cube(ctx, levels);
            let r = kernel::quant(ctx, q, fe, cube);
            ctx.table.decref(cube);
            r
        })
        .map(|e| self.wrap_owned(e))
    }

    /// Existentially eliminate `vars` from `f`.
    pub fn exists(&self, vars: &[VarId], f: &Bdd) -> Result<Bdd> {
        self.quantify(Quant::Exist, vars, f)
    }

    /// Universally eliminate `vars` from `f`.
    pub fn forall(&self, vars: &[VarId], f: &Bdd) -> Result<Bdd> {
        self.quantify(Quant::Forall, vars, f)
    }

    /// Exactly-one ("unique"/XOR) quantification, eliminating `vars`.
    pub fn unique(&self, vars: &[VarId], f: &Bdd) -> Result<Bdd> {
        self.quantify(Quant::Unique, vars, f)
    }

    /// Fused conjunction-then-existential-elimination: `exists(vars, f &&
    /// g)` without fully materializing `f && g` first when only a
    /// single variable is eliminated; falls back to `and` then `exists`
    /// when more than one is (see DESIGN.md for why the fully fused
    /// multi-variable recursion was not implemented).
    pub fn and_exists(&self, vars: &[VarId], f: &Bdd, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        let levels = self.levels_for(vars)?;
        if levels.len() == 1 {
            return self
                .with_ctx(|ctx| kernel::and_exist1(ctx, fe, ge, levels[0]))
                .map(|e| self.wrap_owned(e));
        }
        let h = self.and(f, g)?;
        self.exists(vars, &h)
    }

    /// Substitute `var` in `f` with `g`.
    pub fn compose(&self, f: &Bdd, var: VarId, g: &Bdd) -> Result<Bdd> {
        let (fe, ge) = (self.require(f)?, self.require(g)?);
        let level = self.level_of_var(var)?;
        self.with_ctx(|ctx| kernel::compose(ctx, fe, level, ge))
            .map(|e| self.wrap_owned(e))
    }

    /// Substitute every variable in `mapping` (from -> to) with the
    /// replacement's positive literal. `mapping` need not be a
    /// permutation; every replacement is itself just a variable, and the
    /// structural recursion in `kernel::substitute` already touches each
    /// node of `f` exactly once regardless of how many variables are
    /// renamed.
    pub fn rename(&self, f: &Bdd, mapping: &[(VarId, VarId)]) -> Result<Bdd> {
        let fe = self.require(f)?;
        let mut inner = self.0.borrow_mut();
        let num_levels = inner.table.num_levels().max(inner.var_of_level.len());
        let mut subst: Vec<Option<Edge>> = vec![None; num_levels];
        for &(from, to) in mapping {
            inner.check_var(from)?;
            inner.check_var(to)?;
            let from_level = inner.level_of_var[from as usize];
            let to_lit = inner.var_literal(to)?;
            if subst[from_level as usize].is_some() {
                return Err(Error::MalformedSubstitution {
                    reason: format!("variable #{from} renamed twice"),
                });
            }
            subst[from_level as usize] = Some(to_lit);
        }
        // Fill every untouched level with its own variable's literal so
        // the single-pass recursion still reconstructs equal structure
        // above/below the renamed variables (see `substitute_prepare` in
        // the grounding note of DESIGN.md).
        for (level, slot) in subst.iter_mut().enumerate() {
            if slot.is_none() {
                if let Some(&var) = inner.var_of_level.get(level) {
                    *slot = Some(inner.var_literal(var)?);
                }
            }
        }
        let subst: Vec<Edge> = subst
            .into_iter()
            .map(|e| e.unwrap_or_else(Edge::falsy))
            .collect();
        let cache_id = inner.next_subst_generation();
        let result = {
            let mut ctx = inner.ctx();
            kernel::substitute(&mut ctx, cache_id, fe, &subst)
        };
        for e in &subst {
            inner.table.decref(*e);
        }
        drop(inner);
        let result = result?;
        self.0.borrow_mut().after_top_level_call();
        Ok(self.wrap_owned(result))
    }

    /// Generalized cofactor ("restrict"): simplify `f` using `care` as a
    /// don't-care set expressed as a BDD.
    pub fn restrict(&self, f: &Bdd, care: &Bdd) -> Result<Bdd> {
        let (fe, ce) = (self.require(f)?, self.require(care)?);
        self.with_ctx(|ctx| kernel::restrict(ctx, fe, ce))
            .map(|e| self.wrap_owned(e))
    }

    /// Cofactor `f` under a partial assignment of variables to
    /// constants (repeated single-variable restriction).
    pub fn cofactor(&self, f: &Bdd, assignment: &[(VarId, bool)]) -> Result<Bdd> {
        let fe0 = self.require(f)?;
        let mut pairs: Vec<(Level, bool)> = assignment
            .iter()
            .map(|&(v, b)| Ok((self.level_of_var(v)?, b)))
            .collect::<Result<_>>()?;
        pairs.sort_by_key(|&(level, _)| level);
        let result = self.with_ctx(|ctx| {
            // `fe0` is borrowed from `f`; mint our own owned copy before
            // the loop starts replacing it so every intermediate result
            // (including a zero-iteration no-op) is ours to return.
            let mut fe = ctx.table.clone_edge(fe0);
            for &(level, value) in &pairs {
                let next = kernel::restrict1(ctx, fe, level, value)?;
                ctx.table.decref(fe);
                fe = next;
            }
            Ok(fe)
        });
        result.map(|e| self.wrap_owned(e))
    }

    /// Evaluate `f` under a total assignment of every declared variable.
    pub fn eval(&self, f: &Bdd, assignment: &[(VarId, bool)]) -> Result<bool> {
        let fe = self.require(f)?;
        let inner = self.0.borrow();
        let mut by_level = vec![false; inner.var_of_level.len()];
        for &(v, b) in assignment {
            inner.check_var(v)?;
            by_level[inner.level_of_var[v as usize] as usize] = b;
        }
        Ok(kernel::eval_at(&inner.table, fe, &by_level))
    }

    /// Exact model count over `num_vars` variables (the size of `f`'s
    /// domain, not just its support): an arbitrary-precision integer so
    /// large variable counts never silently wrap.
    pub fn sat_count(&self, f: &Bdd) -> Result<BigUint> {
        let fe = self.require(f)?;
        let inner = self.0.borrow();
        Ok(kernel::sat_count(&inner.table, fe, inner.var_names.len() as u32))
    }

    /// The support set of `f`: every declared variable `f` actually
    /// depends on.
    pub fn support(&self, f: &Bdd) -> Result<Vec<VarId>> {
        let fe = self.require(f)?;
        let inner = self.0.borrow();
        let levels = kernel::support(&inner.table, fe);
        Ok(levels
            .into_iter()
            .map(|level| inner.var_of_level[level as usize])
            .collect())
    }

    /// Walk one satisfying path of `f`, returning `None` if `f` is
    /// identically `FALSE`. Unassigned (don't-care) variables map to
    /// `None`.
    pub fn pick_cube(&self, f: &Bdd) -> Result<Option<Vec<(VarId, Option<bool>)>>> {
        let fe = self.require(f)?;
        let inner = self.0.borrow();
        let num_vars = inner.var_names.len() as u32;
        let by_level = kernel::pick_cube(&inner.table, fe, num_vars, |_, preferred| preferred);
        Ok(by_level.map(|levels| {
            levels
                .into_iter()
                .enumerate()
                .map(|(level, value)| (inner.var_of_level[level], value))
                .collect()
        }))
    }

    /// Every satisfying assignment of `f` over exactly `care_vars`,
    /// which must be a superset of `f`'s support. Materializes the full
    /// list rather than a lazy iterator: this engine's target workloads
    /// stay small enough (tens of variables, not thousands) for that to
    /// be the simpler, still entirely adequate choice.
    pub fn models(&self, f: &Bdd, care_vars: &[VarId]) -> Result<Vec<Vec<bool>>> {
        let fe = self.require(f)?;
        let inner = self.0.borrow();
        let support = kernel::support(&inner.table, fe);
        let levels = self.levels_for(care_vars)?;
        let level_set: std::collections::HashSet<Level> = levels.iter().copied().collect();
        for s in &support {
            if !level_set.contains(s) {
                return Err(Error::PrecondViolated {
                    reason: "care_vars does not cover f's support".to_string(),
                });
            }
        }
        let mut out = Vec::new();
        let mut current = Vec::with_capacity(levels.len());
        fn go(
            table: &UniqueTable,
            f: Edge,
            levels: &[Level],
            idx: usize,
            current: &mut Vec<bool>,
            out: &mut Vec<Vec<bool>>,
        ) {
            if f.is_false() {
                return;
            }
            if idx == levels.len() {
                if f.is_true() {
                    out.push(current.clone());
                }
                return;
            }
            let (lo, hi) = kernel::cofactors(table, f, levels[idx]);
            current.push(false);
            go(table, lo, levels, idx + 1, current, out);
            current.pop();
            current.push(true);
            go(table, hi, levels, idx + 1, current, out);
            current.pop();
        }
        go(&inner.table, fe, &levels, 0, &mut current, &mut out);
        Ok(out)
    }

    /// Force an immediate garbage-collection sweep, regardless of
    /// `Config::garbage_collection`.
    pub fn gc(&self) {
        let mut inner = self.0.borrow_mut();
        gc::sweep(&mut inner.table, &mut inner.cache);
    }

    /// Force an immediate sifting pass, regardless of
    /// `Config::reordering`.
    pub fn reorder(&self) {
        let mut inner = self.0.borrow_mut();
        let start = Instant::now();
        let mut order = inner.var_of_level.clone();
        let cfg = inner.config;
        reorder::sift_pass(
            &mut inner.table,
            &mut inner.cache,
            &mut order,
            cfg.max_vars,
            cfg.max_swaps,
            cfg.max_growth,
        );
        inner.apply_new_order(order);
        inner.reordering_time_sec += start.elapsed().as_secs_f64();
        inner.n_reorderings += 1;
        inner.generation += 1;
        inner.nodes_at_last_reorder = inner.table.live_node_count();
    }

    /// Request cancellation of the next recursive kernel call boundary
    /// this manager is asked to perform (a cooperative cancel token,
    /// polled rather than preemptive).
    pub fn cancel(&self) {
        self.0.borrow().cancelled.set(true);
    }

    /// Clear a pending cancellation request.
    pub fn clear_cancel(&self) {
        self.0.borrow().cancelled.set(false);
    }

    /// A snapshot of manager-wide counters.
    pub fn statistics(&self) -> Stats {
        self.0.borrow().statistics()
    }

    pub(crate) fn config(&self) -> Config {
        self.0.borrow().config
    }

    /// Parse and evaluate a Boolean expression string against this
    /// manager's declared variables. Every free variable must already
    /// be declared; see [`Manager::declare`].
    #[cfg(feature = "expr")]
    pub fn add_expr(&self, input: &str) -> Result<Bdd> {
        crate::expr::parse(input)?.eval(self)
    }

    /// Serialize `roots` to the JSON persistence format.
    #[cfg(feature = "serde")]
    pub fn to_json(&self, roots: &[&Bdd]) -> Result<String> {
        crate::persist::to_json(self, roots)
    }

    /// Reconstruct roots previously serialized with [`Manager::to_json`].
    /// Declares any variable named in the dump that isn't already known.
    #[cfg(feature = "serde")]
    pub fn from_json(&self, json: &str) -> Result<Vec<Bdd>> {
        crate::persist::from_json(self, json)
    }

    /// Write the textual dump format.
    pub fn to_text(&self, roots: &[&Bdd]) -> Result<String> {
        crate::persist::to_text(self, roots)
    }

    /// Reconstruct roots previously serialized with [`Manager::to_text`].
    pub fn from_text(&self, text: &str) -> Result<Vec<Bdd>> {
        crate::persist::from_text(self, text)
    }

    /// Render `roots` as a Graphviz `dot` graph: a minimal in-process
    /// writer with no network call (see DESIGN.md).
    pub fn to_dot(&self, roots: &[(&str, &Bdd)]) -> Result<String> {
        crate::persist::to_dot(self, roots)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Manager::new()
    }
}
