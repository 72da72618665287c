//! Unit tests for grammar construction and the production store

use cfg_toolkit::grammar::Grammar;
use cfg_toolkit::pattern::{Capture, Pattern};
use cfg_toolkit::{ProductionId, SymbolString};

#[test]
fn test_duplicate_production_returns_same_handle() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');
    let b = g.get_terminal('b');

    let p1 = g.add_production(v, a + v + b);
    let p2 = g.add_production(v, a + v + b);

    assert_eq!(p1, p2, "equivalent productions share one handle");
    assert_eq!(g.num_productions(), 1);
}

#[test]
fn test_removing_last_production_reinstates_null() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');

    let p = g.add_production(v, a);
    assert!(!g.has_default_production(v));

    g.remove_production(p);
    assert!(g.has_default_production(v), "head is the null production again");
    assert_eq!(g.num_productions(), 1);
    assert_eq!(g.num_productions_of(v), 1);
}

#[test]
fn test_add_then_remove_restores_counts() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');
    let b = g.get_terminal('b');
    g.add_production(v, a);

    let productions_before = g.num_productions();
    let of_v_before = g.num_productions_of(v);

    let p = g.add_production(v, a + b);
    assert_eq!(g.num_productions(), productions_before + 1);
    g.remove_production(p);

    assert_eq!(g.num_productions(), productions_before);
    assert_eq!(g.num_productions_of(v), of_v_before);
}

#[test]
fn test_held_tombstone_resurrects_under_old_handle() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');
    let b = g.get_terminal('b');
    let target = g.add_production(v, a + b);
    g.add_production(v, b);

    // Bind the production through a generator so its tombstone is held
    // across the removal.
    let pc = Capture::<ProductionId>::new();
    let pat = Pattern::lhs(v).sym(a).sym(b).bind_production(&pc);
    let mut matcher = g.search(&pat);
    assert!(matcher.match_next(&g));
    assert_eq!(pc.get(), target);

    g.remove_production(target);
    assert_eq!(g.num_productions_of(v), 1);

    let back = g.add_production(v, a + b);
    assert_eq!(back, target, "retained tombstone keeps its identity");
    assert_eq!(g.num_productions_of(v), 2);
}

#[test]
fn test_unheld_tombstone_is_reclaimed() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');
    let b = g.get_terminal('b');
    let first = g.add_production(v, a + b);
    g.add_production(v, b);

    g.remove_production(first);
    let again = g.add_production(v, a + b);
    assert_ne!(again, first, "nothing held the tombstone, so the id is fresh");
}

#[test]
fn test_remove_variable_removes_sole_producers_transitively() {
    let mut g = Grammar::<char>::new();
    let v = g.get_variable("V");
    let w = g.get_variable("W");
    g.add_production(w, v);

    assert_eq!(g.num_variables(), 2);
    g.remove_variable(v);

    // W produced nothing but V, so it went too.
    assert_eq!(g.num_variables(), 0);
    assert_eq!(g.num_productions(), 0);
}

#[test]
fn test_remove_variable_strips_occurrences_elsewhere() {
    let mut g = Grammar::<char>::new();
    let v = g.get_variable("V");
    let w = g.get_variable("W");
    let a = g.get_terminal('a');
    let b = g.get_terminal('b');
    let c = g.get_terminal('c');
    g.add_production(w, a + v + b);
    g.add_production(w, c);

    g.remove_variable(v);

    assert_eq!(g.num_variables(), 1);
    assert_eq!(g.num_productions_of(w), 2);

    let rhs = Capture::<SymbolString>::new();
    let pat = Pattern::lhs(w).capture_string(&rhs);
    let mut matcher = g.search(&pat);
    let mut seen = Vec::new();
    while matcher.match_next(&g) {
        seen.push(rhs.get());
    }
    assert!(seen.contains(&(a + b)), "V stripped out of W → a V b");
    assert!(seen.contains(&SymbolString::from(c)));
}

#[test]
fn test_epsilon_identities() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');
    let s = a + v;

    assert_eq!(g.epsilon().clone() + s.clone(), s);
    assert_eq!(s.clone() + g.epsilon().clone(), s);
    assert_eq!(g.epsilon().len(), 0);
    assert_eq!(g.epsilon(), &SymbolString::epsilon());
}

#[test]
#[should_panic(expected = "production already removed")]
fn test_double_remove_of_held_production_fails_fast() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');
    g.add_production(v, a);
    let p = g.add_production(v, a + a);

    // keep the tombstone alive across the first removal
    let pc = Capture::<ProductionId>::new();
    let pat = Pattern::lhs(v).sym(a).sym(a).bind_production(&pc);
    let mut matcher = g.search(&pat);
    assert!(matcher.match_next(&g));

    g.remove_production(p);
    g.remove_production(p);
}

#[test]
#[should_panic(expected = "invalid production handle")]
fn test_stale_handle_fails_fast() {
    let mut g = Grammar::<char>::new();
    let v = g.add_variable();
    let a = g.get_terminal('a');
    g.add_production(v, a);
    let p = g.add_production(v, a + a);
    // nothing holds p, so removal reclaims its storage immediately
    g.remove_production(p);
    g.rhs(p);
}

#[test]
#[should_panic(expected = "no start variable")]
fn test_empty_grammar_has_no_start() {
    let g = Grammar::<char>::new();
    g.get_start_variable();
}
