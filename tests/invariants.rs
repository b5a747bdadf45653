//! Property-based tests for the universal invariants the engine must
//! hold regardless of the particular functions built: canonicity,
//! reduction, De Morgan, idempotence, Shannon expansion, quantifier
//! duality and reordering-preserves-function.

use proptest::prelude::*;
use robdd::{Bdd, Manager, VarId};

const N_VARS: usize = 4;

/// A small grammar of Boolean terms over a fixed variable pool, used
/// to drive the kernel with varied but reproducible structure.
#[derive(Debug, Clone)]
enum Term {
    Var(usize),
    Not(Box<Term>),
    And(Box<Term>, Box<Term>),
    Or(Box<Term>, Box<Term>),
    Xor(Box<Term>, Box<Term>),
}

fn arb_term() -> impl Strategy<Value = Term> {
    let leaf = (0..N_VARS).prop_map(Term::Var);
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| Term::Not(Box::new(t))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Term::And(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Term::Or(Box::new(a), Box::new(b))),
            (inner.clone(), inner).prop_map(|(a, b)| Term::Xor(Box::new(a), Box::new(b))),
        ]
    })
}

fn build(m: &Manager, vars: &[VarId], t: &Term) -> Bdd {
    match t {
        Term::Var(i) => m.var(vars[*i]).unwrap(),
        Term::Not(a) => m.not(&build(m, vars, a)).unwrap(),
        Term::And(a, b) => m.and(&build(m, vars, a), &build(m, vars, b)).unwrap(),
        Term::Or(a, b) => m.or(&build(m, vars, a), &build(m, vars, b)).unwrap(),
        Term::Xor(a, b) => m.xor(&build(m, vars, a), &build(m, vars, b)).unwrap(),
    }
}

fn eval_term(t: &Term, assignment: &[bool]) -> bool {
    match t {
        Term::Var(i) => assignment[*i],
        Term::Not(a) => !eval_term(a, assignment),
        Term::And(a, b) => eval_term(a, assignment) && eval_term(b, assignment),
        Term::Or(a, b) => eval_term(a, assignment) || eval_term(b, assignment),
        Term::Xor(a, b) => eval_term(a, assignment) ^ eval_term(b, assignment),
    }
}

fn all_assignments() -> Vec<Vec<bool>> {
    (0..1u32 << N_VARS)
        .map(|mask| (0..N_VARS).map(|i| (mask >> i) & 1 == 1).collect())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn canonicity_tracks_semantic_equality(a in arb_term(), b in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let fa = build(&m, &vars, &a);
        let fb = build(&m, &vars, &b);

        let semantically_equal = all_assignments()
            .iter()
            .all(|asg| eval_term(&a, asg) == eval_term(&b, asg));
        prop_assert_eq!(fa == fb, semantically_equal);
    }

    #[test]
    fn double_negation_is_identity(a in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let f = build(&m, &vars, &a);
        prop_assert_eq!(m.not(&m.not(&f).unwrap()).unwrap(), f);
    }

    #[test]
    fn de_morgan_holds_for_and(a in arb_term(), b in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let fa = build(&m, &vars, &a);
        let fb = build(&m, &vars, &b);

        let lhs = m.not(&m.and(&fa, &fb).unwrap()).unwrap();
        let rhs = m
            .or(&m.not(&fa).unwrap(), &m.not(&fb).unwrap())
            .unwrap();
        prop_assert_eq!(lhs, rhs);
    }

    #[test]
    fn and_and_or_are_idempotent(a in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let f = build(&m, &vars, &a);
        prop_assert_eq!(m.and(&f, &f).unwrap(), f.clone());
        prop_assert_eq!(m.or(&f, &f).unwrap(), f);
    }

    #[test]
    fn shannon_expansion_reconstructs_the_function(a in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let f = build(&m, &vars, &a);
        let x = m.var(vars[0]).unwrap();
        let hi = m.cofactor(&f, &[(vars[0], true)]).unwrap();
        let lo = m.cofactor(&f, &[(vars[0], false)]).unwrap();
        let rebuilt = m.ite(&x, &hi, &lo).unwrap();
        prop_assert_eq!(rebuilt, f);
    }

    #[test]
    fn quantifier_duality_holds(a in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let f = build(&m, &vars, &a);
        let target = &vars[0..2];

        let lhs = m.forall(target, &f).unwrap();
        let rhs = m
            .not(&m.exists(target, &m.not(&f).unwrap()).unwrap())
            .unwrap();
        prop_assert_eq!(lhs, rhs);
    }

    #[test]
    fn reordering_preserves_model_count_and_evaluation(a in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let f = build(&m, &vars, &a);

        let count_before = f.sat_count().unwrap();
        let assignments = all_assignments();
        let before: Vec<bool> = assignments
            .iter()
            .map(|asg| {
                let pairs: Vec<_> = vars.iter().copied().zip(asg.iter().copied()).collect();
                m.eval(&f, &pairs).unwrap()
            })
            .collect();

        m.reorder();

        let count_after = f.sat_count().unwrap();
        let after: Vec<bool> = assignments
            .iter()
            .map(|asg| {
                let pairs: Vec<_> = vars.iter().copied().zip(asg.iter().copied()).collect();
                m.eval(&f, &pairs).unwrap()
            })
            .collect();

        prop_assert_eq!(count_before, count_after);
        prop_assert_eq!(before, after);
    }

    #[test]
    fn garbage_collection_does_not_change_external_results(a in arb_term(), b in arb_term()) {
        let m = Manager::new();
        let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
        let fa = build(&m, &vars, &a);
        let _fb = build(&m, &vars, &b); // builds and drops intermediate garbage

        let count_before = fa.sat_count().unwrap();
        m.gc();
        let count_after = fa.sat_count().unwrap();
        prop_assert_eq!(count_before, count_after);
    }
}
