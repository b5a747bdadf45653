//! The Apply/ITE kernel: every Boolean operation the manager exposes
//! bottoms out in [`ite`], the universal ternary operator, or in one of
//! the handful of single-variable structural recursions (`restrict1`,
//! `quant1`, `and_exist1`, `compose1`) built directly on top of it,
//! operating on the concrete [`UniqueTable`]/[`ApplyCache`] pair owned
//! by `crate::manager::ManagerInner`.
//!
//! Ownership convention used by every function below: arguments are
//! *borrowed* (never decref'd by the callee); every `Result<Edge>`
//! return value is *owned* (its target's ref count already counts that
//! return). The only place this is reconciled against the unique table
//! is [`reduce`].

use std::cell::Cell;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::apply_cache::{ApplyCache, CacheKey, Op};
use crate::edge::Edge;
use crate::error::{Error, Result};
use crate::node::Level;
use crate::unique_table::{Lookup, UniqueTable};

/// Borrows the two structures the kernel touches, plus a cooperative
/// cancellation flag checked at every recursive call: cancellation is
/// cooperative, so long-running calls must poll this token rather than
/// being preempted.
pub(crate) struct Ctx<'a> {
    pub table: &'a mut UniqueTable,
    pub cache: &'a mut ApplyCache,
    pub cancelled: &'a Cell<bool>,
}

impl<'a> Ctx<'a> {
    #[inline]
    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.get() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Finish building an interior node from two already-owned edges,
/// applying the NodeStore's structural reductions and reconciling
/// ownership with whichever [`Lookup`] outcome comes back.
///
/// Consumes `low` and `high`: their ownership either transfers into the
/// new node's child slots (created case), is released because an
/// existing node already owns its own children (found case), or
/// collapses into the single surviving reference (trivial case).
pub(crate) fn reduce(ctx: &mut Ctx, level: Level, low: Edge, high: Edge) -> Edge {
    match ctx.table.find_or_add(level, low, high) {
        Lookup::Trivial(e) => {
            // low == high as values; we were handed two separate owned
            // references to the same node. Keep one, release the other.
            ctx.table.decref(low);
            e
        }
        Lookup::Found(e) => {
            ctx.table.decref(low);
            ctx.table.decref(high);
            ctx.table.incref(e);
            e
        }
        Lookup::Created(e) => {
            ctx.table.incref(e);
            e
        }
    }
}

/// Cofactors of `f` with respect to `level`: if `f`'s top node is at
/// `level`, its two children (with `f`'s complement tag applied to
/// both, since only `high` is ever stored uncomplemented); otherwise
/// `(f, f)`, since `f` does not depend on that variable.
pub(crate) fn cofactors(table: &UniqueTable, f: Edge, level: Level) -> (Edge, Edge) {
    if f.is_constant() || table.level_of(f) != level {
        return (f, f);
    }
    let node = table.node(f.node());
    (node.low.xor_tag(f.complement()), node.high.xor_tag(f.complement()))
}

/// `not`: an allocation-free tag flip, never touches the cache.
pub(crate) fn apply_not(ctx: &mut Ctx, f: Edge) -> Edge {
    let r = f.negate();
    ctx.table.incref(r);
    r
}

/// The universal ITE kernel: `f ? g : h`.
pub(crate) fn ite(ctx: &mut Ctx, f: Edge, g: Edge, h: Edge) -> Result<Edge> {
    ctx.check_cancelled()?;

    if f.is_true() {
        return Ok(ctx.table.clone_edge(g));
    }
    if f.is_false() {
        return Ok(ctx.table.clone_edge(h));
    }
    if g == h {
        return Ok(ctx.table.clone_edge(g));
    }
    if g.is_true() && h.is_false() {
        return Ok(ctx.table.clone_edge(f));
    }
    if g.is_false() && h.is_true() {
        return Ok(apply_not(ctx, f));
    }

    // Normalize away a complemented `f` so that `ite(f,g,h)` and
    // `ite(not f,h,g)` share one cache entry.
    let (f, g, h) = if f.complement() {
        (f.negate(), h, g)
    } else {
        (f, g, h)
    };

    let key = CacheKey::new(Op::Ite, f, g, h);
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let level = [f, g, h]
        .into_iter()
        .filter(|e| !e.is_constant())
        .map(|e| ctx.table.level_of(e))
        .min()
        .expect("at least one of f, g, h is non-constant here");

    let (f0, f1) = cofactors(ctx.table, f, level);
    let (g0, g1) = cofactors(ctx.table, g, level);
    let (h0, h1) = cofactors(ctx.table, h, level);

    let lo = ite(ctx, f0, g0, h0)?;
    let hi = ite(ctx, f1, g1, h1)?;
    let result = reduce(ctx, level, lo, hi);

    ctx.cache.insert(key, result);
    Ok(result)
}

pub(crate) fn apply_and(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    ite(ctx, f, g, Edge::falsy())
}

pub(crate) fn apply_or(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    ite(ctx, f, Edge::truthy(), g)
}

pub(crate) fn apply_xor(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    ite(ctx, f, g.negate(), g)
}

pub(crate) fn apply_nand(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    let r = apply_and(ctx, f, g)?;
    let n = apply_not(ctx, r);
    ctx.table.decref(r);
    Ok(n)
}

pub(crate) fn apply_nor(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    let r = apply_or(ctx, f, g)?;
    let n = apply_not(ctx, r);
    ctx.table.decref(r);
    Ok(n)
}

/// `f -> g`.
pub(crate) fn apply_implies(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    ite(ctx, f, g, Edge::truthy())
}

/// Strict implication: `f -> g` and `f != g`, i.e. `!f && g`.
pub(crate) fn apply_imp_strict(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    ite(ctx, f, Edge::falsy(), g)
}

pub(crate) fn apply_equiv(ctx: &mut Ctx, f: Edge, g: Edge) -> Result<Edge> {
    ite(ctx, f, g, g.negate())
}

/// Single-variable restriction: fix the variable at `level` to `value`.
pub(crate) fn restrict1(ctx: &mut Ctx, f: Edge, level: Level, value: bool) -> Result<Edge> {
    ctx.check_cancelled()?;

    if f.is_constant() {
        return Ok(ctx.table.clone_edge(f));
    }
    let fl = ctx.table.level_of(f);
    if fl > level {
        return Ok(ctx.table.clone_edge(f));
    }
    if fl == level {
        let (lo, hi) = cofactors(ctx.table, f, level);
        return Ok(ctx.table.clone_edge(if value { hi } else { lo }));
    }

    let val_edge = if value { Edge::truthy() } else { Edge::falsy() };
    let key = CacheKey::new(Op::Restrict1(level), f, val_edge, Edge::falsy());
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let node = ctx.table.node(f.node());
    let (low, high) = (node.low.xor_tag(f.complement()), node.high.xor_tag(f.complement()));
    let lo = restrict1(ctx, low, level, value)?;
    let hi = restrict1(ctx, high, level, value)?;
    let result = reduce(ctx, fl, lo, hi);

    ctx.cache.insert(key, result);
    Ok(result)
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quant {
    Exist,
    Forall,
    Unique,
}

impl Quant {
    fn op(self, level: Level) -> Op {
        match self {
            Quant::Exist => Op::Exist1(level),
            Quant::Forall => Op::Forall1(level),
            Quant::Unique => Op::Unique1(level),
        }
    }
}

/// Single-variable quantification: eliminate the variable at `level`
/// from `f`, combining its two cofactors with `or` (exist), `and`
/// (forall), or `xor` (unique, i.e. exactly-one).
pub(crate) fn quant1(ctx: &mut Ctx, q: Quant, f: Edge, level: Level) -> Result<Edge> {
    ctx.check_cancelled()?;

    if f.is_constant() {
        return Ok(ctx.table.clone_edge(f));
    }
    let fl = ctx.table.level_of(f);
    if fl > level {
        return Ok(ctx.table.clone_edge(f));
    }

    if fl == level {
        let (lo, hi) = cofactors(ctx.table, f, level);
        return match q {
            Quant::Exist => apply_or(ctx, lo, hi),
            Quant::Forall => apply_and(ctx, lo, hi),
            Quant::Unique => apply_xor(ctx, lo, hi),
        };
    }

    let key = CacheKey::new(q.op(level), f, Edge::falsy(), Edge::falsy());
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let node = ctx.table.node(f.node());
    let (low, high) = (node.low.xor_tag(f.complement()), node.high.xor_tag(f.complement()));
    let lo = quant1(ctx, q, low, level)?;
    let hi = quant1(ctx, q, high, level)?;
    let result = reduce(ctx, fl, lo, hi);

    ctx.cache.insert(key, result);
    Ok(result)
}

/// Fused conjunction-then-existential-elimination: `exists(level, f &&
/// g)` without materializing the full conjunction first.
pub(crate) fn and_exist1(ctx: &mut Ctx, f: Edge, g: Edge, level: Level) -> Result<Edge> {
    ctx.check_cancelled()?;

    if f.is_false() || g.is_false() {
        return Ok(Edge::falsy());
    }
    if f.is_true() {
        return quant1(ctx, Quant::Exist, g, level);
    }
    if g.is_true() {
        return quant1(ctx, Quant::Exist, f, level);
    }
    if f == g {
        return quant1(ctx, Quant::Exist, f, level);
    }
    if f == g.negate() {
        return Ok(Edge::falsy());
    }

    let fl = ctx.table.level_of(f);
    let gl = ctx.table.level_of(g);
    let top = fl.min(gl);

    if top > level {
        // Neither operand depends on the variable being eliminated.
        return apply_and(ctx, f, g);
    }

    let key = CacheKey::new(Op::AndExist(level), f, g, Edge::falsy());
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let (f0, f1) = cofactors(ctx.table, f, top);
    let (g0, g1) = cofactors(ctx.table, g, top);

    let result = if top == level {
        let lo = apply_and(ctx, f0, g0)?;
        let hi = apply_and(ctx, f1, g1)?;
        let r = apply_or(ctx, lo, hi)?;
        ctx.table.decref(lo);
        ctx.table.decref(hi);
        r
    } else {
        let lo = and_exist1(ctx, f0, g0, level)?;
        let hi = and_exist1(ctx, f1, g1, level)?;
        reduce(ctx, top, lo, hi)
    };

    ctx.cache.insert(key, result);
    Ok(result)
}

/// Substitute the variable at `level` with the function `g`:
/// `ite(g, f|level=1, f|level=0)`.
pub(crate) fn compose(ctx: &mut Ctx, f: Edge, level: Level, g: Edge) -> Result<Edge> {
    ctx.check_cancelled()?;

    let key = CacheKey::new(Op::Compose(level), f, g, Edge::falsy());
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let f1 = restrict1(ctx, f, level, true)?;
    let f0 = restrict1(ctx, f, level, false)?;
    let result = ite(ctx, g, f1, f0)?;
    ctx.table.decref(f1);
    ctx.table.decref(f0);

    ctx.cache.insert(key, result);
    Ok(result)
}

/// Exact model count over `num_vars` variables, reported via an
/// arbitrary-precision integer rather than a floating-point
/// approximation.
pub(crate) fn sat_count(table: &UniqueTable, f: Edge, num_vars: u32) -> BigUint {
    fn go(table: &UniqueTable, f: Edge, cache: &mut std::collections::HashMap<Edge, BigUint>) -> BigUint {
        if f.is_false() {
            return BigUint::zero();
        }
        if f.is_true() {
            return BigUint::one();
        }
        if let Some(c) = cache.get(&f) {
            return c.clone();
        }
        let node = table.node(f.node());
        let (low, high) = (node.low.xor_tag(f.complement()), node.high.xor_tag(f.complement()));
        let below = |child: Edge| -> u32 {
            if child.is_constant() {
                0
            } else {
                table.node(child.node()).level - node.level - 1
            }
        };
        let lo_count = go(table, low, cache) * (BigUint::from(2u32).pow(below(low)));
        let hi_count = go(table, high, cache) * (BigUint::from(2u32).pow(below(high)));
        let total = lo_count + hi_count;
        cache.insert(f, total.clone());
        total
    }

    let mut cache = std::collections::HashMap::new();
    let count = go(table, f, &mut cache);
    let top_level = if f.is_constant() { 0 } else { table.node(f.node()).level };
    let skipped_above = if f.is_false() || f.is_true() { num_vars } else { top_level };
    count * BigUint::from(2u32).pow(skipped_above)
}

/// Evaluate `f` under a total assignment (`assignment[level]` is the
/// value of the variable at that level).
pub(crate) fn eval_at(table: &UniqueTable, mut f: Edge, assignment: &[bool]) -> bool {
    loop {
        if f.is_constant() {
            return f.is_true();
        }
        let level = table.level_of(f);
        let (low, high) = cofactors(table, f, level);
        f = if assignment[level as usize] { high } else { low };
    }
}

/// Walk one satisfying path, calling `choice(level, preferred)` whenever
/// both cofactors are satisfiable and a choice must be made (mirrors
/// `apply_rec_st::pick_cube_edge`'s caller-supplied tie-breaker).
pub(crate) fn pick_cube(
    table: &UniqueTable,
    mut f: Edge,
    num_vars: u32,
    mut choice: impl FnMut(Level, bool) -> bool,
) -> Option<Vec<Option<bool>>> {
    if f.is_false() {
        return None;
    }
    let mut result = vec![None; num_vars as usize];
    while !f.is_constant() {
        let level = table.level_of(f);
        let (low, high) = cofactors(table, f, level);
        let take_high = if high.is_false() {
            false
        } else if low.is_false() {
            true
        } else {
            choice(level, true)
        };
        result[level as usize] = Some(take_high);
        f = if take_high { high } else { low };
    }
    Some(result)
}

/// Build a cube edge (a conjunction of positive literals) for `levels`,
/// which need not be sorted or deduplicated. The result's `low` child is
/// `FALSE` at every node on the path, the shape `crate::kernel::quant`
/// relies on to walk a vars-set via its `high` child only.
pub(crate) fn build_cube(ctx: &mut Ctx, mut levels: Vec<Level>) -> Edge {
    levels.sort_unstable();
    levels.dedup();
    let mut cube = Edge::truthy();
    for &level in levels.iter().rev() {
        cube = reduce(ctx, level, Edge::falsy(), cube);
    }
    cube
}

/// Drop every leading variable of a cube whose level is strictly less
/// than `floor`: `f` cannot depend on those variables, so keeping them
/// in the cache key only hurts the hit rate.
fn cube_pop(table: &UniqueTable, mut vars: Edge, floor: Level) -> Edge {
    while !vars.is_constant() && table.level_of(vars) < floor {
        vars = table.node(vars.node()).high;
    }
    vars
}

/// Quantification over a set of variables encoded as a cube edge built
/// by [`build_cube`]. `q` selects whether eliminated variables are
/// combined with `or` (existential), `and` (universal), or `xor`
/// (unique/exactly-one).
pub(crate) fn quant(ctx: &mut Ctx, q: Quant, f: Edge, vars: Edge) -> Result<Edge> {
    ctx.check_cancelled()?;

    if f.is_constant() {
        return if q != Quant::Unique || vars.is_constant() {
            Ok(ctx.table.clone_edge(f))
        } else {
            // exactly-one quantification over a nonempty set applied to
            // a constant is `c xor c xor ... xor c` an even number of
            // times beyond the first, i.e. always FALSE.
            Ok(Edge::falsy())
        };
    }

    let flevel = ctx.table.level_of(f);
    let vars = if q != Quant::Unique {
        cube_pop(ctx.table, vars, flevel)
    } else {
        vars
    };
    if vars.is_constant() {
        return Ok(ctx.table.clone_edge(f));
    }
    let vlevel = ctx.table.level_of(vars);
    if q == Quant::Unique && vlevel < flevel {
        // the variable set's top variable doesn't occur in `f`
        return Ok(Edge::falsy());
    }
    debug_assert!(flevel <= vlevel);

    let op = match q {
        Quant::Exist => Op::Exist,
        Quant::Forall => Op::Forall,
        Quant::Unique => Op::Unique,
    };
    let key = CacheKey::new(op, f, vars, Edge::falsy());
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let (lo, hi) = cofactors(ctx.table, f, flevel);
    let in_vars = vlevel == flevel;
    let vars_rest = if in_vars {
        ctx.table.node(vars.node()).high
    } else {
        vars
    };

    let t = quant(ctx, q, hi, vars_rest)?;
    let e = quant(ctx, q, lo, vars_rest)?;
    let result = if in_vars {
        let r = match q {
            Quant::Exist => apply_or(ctx, e, t)?,
            Quant::Forall => apply_and(ctx, e, t)?,
            Quant::Unique => apply_xor(ctx, e, t)?,
        };
        ctx.table.decref(e);
        ctx.table.decref(t);
        r
    } else {
        reduce(ctx, flevel, e, t)
    };

    ctx.cache.insert(key, result);
    Ok(result)
}

/// Multi-variable substitution: `subst[level]` gives the replacement
/// edge for the variable at `level`; levels at or above `subst.len()`
/// are left untouched. `rename` (variable-to-variable substitution) and
/// general `compose` over several variables at once both build such an
/// array and call this once: preparing the full per-level array up
/// front means every variable is substituted in one traversal of `f`
/// instead of one traversal per variable.
///
/// `cache_id` distinguishes the apply-cache entries of one call to this
/// function (one substitution map) from another's; the manager bumps it
/// every time a new map is installed.
pub(crate) fn substitute(ctx: &mut Ctx, cache_id: u32, f: Edge, subst: &[Edge]) -> Result<Edge> {
    ctx.check_cancelled()?;

    if f.is_constant() {
        return Ok(ctx.table.clone_edge(f));
    }
    let level = ctx.table.level_of(f);
    if level as usize >= subst.len() {
        return Ok(ctx.table.clone_edge(f));
    }

    let key = CacheKey::new(Op::Compose(cache_id), f, Edge::falsy(), Edge::falsy());
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let (lo, hi) = cofactors(ctx.table, f, level);
    let t = substitute(ctx, cache_id, hi, subst)?;
    let e = substitute(ctx, cache_id, lo, subst)?;
    let result = ite(ctx, subst[level as usize], t, e)?;
    ctx.table.decref(t);
    ctx.table.decref(e);

    ctx.cache.insert(key, result);
    Ok(result)
}

/// Coudert-Madre generalized cofactor ("restrict"): like
/// [`eval_at`]/cofactor but the *care set* `c` is itself a BDD rather
/// than a total assignment, so `f` is only simplified where `c` is
/// unconstrained (this is what lets `restrict` shrink `f` below what
/// fixing individual variables can achieve). `c == FALSE` denotes an
/// empty care set; the result is conventionally `FALSE` in that case,
/// matching the Boolean-algebra shortcut `f` restricted to an empty
/// domain has no satisfying points to disagree on.
pub(crate) fn restrict(ctx: &mut Ctx, f: Edge, c: Edge) -> Result<Edge> {
    ctx.check_cancelled()?;

    if c.is_true() || f.is_constant() {
        return Ok(ctx.table.clone_edge(f));
    }
    if c.is_false() {
        return Ok(Edge::falsy());
    }

    let key = CacheKey::new(Op::RestrictCube, f, c, Edge::falsy());
    if let Some(hit) = ctx.cache.get(&key) {
        return Ok(ctx.table.clone_edge(hit));
    }

    let flevel = ctx.table.level_of(f);
    let clevel = ctx.table.level_of(c);
    let level = flevel.min(clevel);

    let (f0, f1) = cofactors(ctx.table, f, level);
    let (c0, c1) = cofactors(ctx.table, c, level);

    let result = if c0.is_false() {
        restrict(ctx, f1, c1)?
    } else if c1.is_false() {
        restrict(ctx, f0, c0)?
    } else {
        let t = restrict(ctx, f1, c1)?;
        let e = restrict(ctx, f0, c0)?;
        reduce(ctx, level, e, t)
    };

    ctx.cache.insert(key, result);
    Ok(result)
}

/// The support set of `f`: every level whose variable `f` actually
/// depends on, each appearing once, in ascending order. A plain DAG
/// walk with a `visited` set rather than a cached kernel op, since the
/// result isn't itself a BDD edge the apply cache's `(op, edges...)`
/// shape can key on cheaply. Distinct nodes can share a level (`f`
/// branching into two different cofactor subfunctions that both test
/// the same variable further down), so the per-node levels collected by
/// the walk are deduplicated before being returned.
pub(crate) fn support(table: &UniqueTable, f: Edge) -> Vec<Level> {
    fn go(table: &UniqueTable, f: Edge, seen: &mut rustc_hash::FxHashSet<crate::edge::NodeId>, out: &mut Vec<Level>) {
        if f.is_constant() || !seen.insert(f.node()) {
            return;
        }
        let node = table.node(f.node());
        out.push(node.level);
        go(table, node.low, seen, out);
        go(table, node.high, seen, out);
    }
    let mut out = Vec::new();
    let mut seen = rustc_hash::FxHashSet::default();
    go(table, f, &mut seen, &mut out);
    out.sort_unstable();
    out.dedup();
    out
}
