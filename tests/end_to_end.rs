//! Concrete end-to-end scenarios exercising the public API together,
//! rather than one operation per test as in the unit tests alongside
//! each module.

use robdd::Manager;

#[test]
fn conjunction_of_two_variables_has_one_model() {
    let m = Manager::new();
    let vars = m.declare(&["x", "y"]).unwrap();
    let x = m.var(vars[0]).unwrap();
    let y = m.var(vars[1]).unwrap();
    let e = m.and(&x, &y).unwrap();

    assert_eq!(e.sat_count().unwrap(), 1u32.into());
    let cube = e.pick_cube().unwrap().unwrap();
    assert_eq!(cube, vec![(vars[0], Some(true)), (vars[1], Some(true))]);
}

#[test]
fn or_and_not_over_three_variables_has_three_models() {
    let m = Manager::new();
    let vars = m.declare(&["x", "y", "z"]).unwrap();
    let x = m.var(vars[0]).unwrap();
    let y = m.var(vars[1]).unwrap();
    let z = m.var(vars[2]).unwrap();
    let e = m.and(&m.or(&x, &y).unwrap(), &m.not(&z).unwrap()).unwrap();

    assert_eq!(e.sat_count().unwrap(), 3u32.into());

    let models: std::collections::HashSet<Vec<bool>> =
        m.models(&e, &vars).unwrap().into_iter().collect();
    let expected: std::collections::HashSet<Vec<bool>> = [
        vec![true, false, false],
        vec![false, true, false],
        vec![true, true, false],
    ]
    .into_iter()
    .collect();
    assert_eq!(models, expected);
}

#[test]
fn implication_and_its_disjunctive_definition_are_pointer_equal() {
    let m = Manager::new();
    let vars = m.declare(&["x", "y"]).unwrap();
    let x = m.var(vars[0]).unwrap();
    let y = m.var(vars[1]).unwrap();

    let f = m.implies(&x, &y).unwrap();
    let g = m.or(&m.not(&x).unwrap(), &y).unwrap();
    assert_eq!(f, g);
}

#[test]
fn existentially_quantifying_away_a_conjunct_leaves_the_other_literal() {
    let m = Manager::new();
    let vars = m.declare(&["x", "y"]).unwrap();
    let x = m.var(vars[0]).unwrap();
    let y = m.var(vars[1]).unwrap();

    let e = m.exists(&[vars[1]], &m.and(&x, &y).unwrap()).unwrap();
    assert_eq!(e, x);
}

#[test]
fn parity_over_four_variables_has_five_nodes_under_any_starting_order() {
    // Run with `RUST_LOG=debug` to see the sifting pass's per-variable
    // size search logged live.
    let _ = env_logger::try_init();
    let m = Manager::new();
    let vars = m.declare(&["x0", "x1", "x2", "x3"]).unwrap();
    let mut parity = m.falsy();
    for &v in &vars {
        let lit = m.var(v).unwrap();
        parity = m.xor(&parity, &lit).unwrap();
    }
    assert_eq!(m.statistics().n_nodes, 5);

    m.reorder();
    assert_eq!(m.statistics().n_nodes, 5);
    assert_eq!(parity.sat_count().unwrap(), 8u32.into());
}

#[test]
fn picking_every_model_of_true_over_six_care_variables_yields_all_64() {
    let m = Manager::new();
    let vars = m.declare(&["x0", "x1", "x2", "x3", "x4", "x5"]).unwrap();
    let t = m.truthy();
    let models = m.models(&t, &vars).unwrap();
    let unique: std::collections::HashSet<Vec<bool>> = models.iter().cloned().collect();
    assert_eq!(models.len(), 64);
    assert_eq!(unique.len(), 64);
}

#[test]
fn reordering_an_asymmetric_ite_does_not_drop_a_live_grandchild() {
    // Regression test: swapping levels 0/1 of `ite(a, b, c)` rewrites
    // the level-1 node's children to point at cofactors of the level-2
    // `c` node, a case that hits `Lookup::Created` (unlike symmetric
    // functions, which only ever hit `Found`). The rewritten node must
    // incref those grandchildren or `c` gets swept out from under it.
    let m = Manager::new();
    let vars = m.declare(&["a", "b", "c"]).unwrap();
    let a = m.var(vars[0]).unwrap();
    let b = m.var(vars[1]).unwrap();
    let c = m.var(vars[2]).unwrap();
    let f = m.ite(&a, &b, &c).unwrap();
    drop(a);
    drop(b);
    drop(c);

    m.reorder();

    assert_eq!(f.sat_count().unwrap(), 4u32.into());
    assert!(f.eval(&[(vars[0], true), (vars[1], true), (vars[2], false)]).unwrap());
    assert!(!f.eval(&[(vars[0], true), (vars[1], false), (vars[2], true)]).unwrap());
    assert!(f.eval(&[(vars[0], false), (vars[1], false), (vars[2], true)]).unwrap());
}

#[test]
fn reordering_preserves_a_held_handles_function() {
    let m = Manager::new();
    let vars = m.declare(&["x", "y", "z"]).unwrap();
    let x = m.var(vars[0]).unwrap();
    let y = m.var(vars[1]).unwrap();
    let e = m.and(&x, &y).unwrap();

    // drive the variable order to [z, y, x] by sifting repeatedly;
    // sifting picks its own targets, so just run several passes and
    // check the held handle's behavior is unaffected either way.
    for _ in 0..4 {
        m.reorder();
    }

    let cube = e.pick_cube().unwrap().unwrap();
    let as_map: std::collections::HashMap<_, _> = cube.into_iter().collect();
    assert_eq!(as_map[&vars[0]], Some(true));
    assert_eq!(as_map[&vars[1]], Some(true));
    assert_eq!(as_map.get(&vars[2]).copied().unwrap_or(None), None);
}

#[test]
fn json_round_trip_preserves_the_function_and_variable_order() {
    let m = Manager::new();
    let vars = m.declare(&["x", "y", "z"]).unwrap();
    let x = m.var(vars[0]).unwrap();
    let y = m.var(vars[1]).unwrap();
    let z = m.var(vars[2]).unwrap();
    let e = m
        .and(&m.or(&x, &y).unwrap(), &m.not(&z).unwrap())
        .unwrap();

    let dump = m.to_json(&[&e]).unwrap();
    let m2 = Manager::new();
    let roots = m2.from_json(&dump).unwrap();
    assert_eq!(m2.var_levels().len(), m.var_levels().len());
    assert_eq!(roots[0].sat_count().unwrap(), e.sat_count().unwrap());
}

#[cfg(feature = "expr")]
#[test]
fn the_expression_adapter_agrees_with_the_same_function_built_by_hand() {
    let m = Manager::new();
    m.declare(&["x", "y"]).unwrap();
    let parsed = m.add_expr("x and y").unwrap();
    let vx = m.var(m.var_by_name("x").unwrap()).unwrap();
    let vy = m.var(m.var_by_name("y").unwrap()).unwrap();
    let hand_built = m.and(&vx, &vy).unwrap();
    assert_eq!(parsed, hand_built);
}
