//! Unit tests for the Earley recognizer and parse trees

use cfg_toolkit::analysis::{compute_first_set, compute_null_set};
use cfg_toolkit::earley::{ParseTree, parse, recognize};
use cfg_toolkit::grammar::Grammar;

fn balanced() -> Grammar<char> {
    // S → a S b | ε
    let mut g = Grammar::<char>::new();
    let s = g.get_variable("S");
    let a = g.get_terminal('a');
    let b = g.get_terminal('b');
    g.add_production(s, a + s + b);
    g.add_production(s, g.epsilon().clone());
    g
}

/// Checks that every node expands its production faithfully and counts
/// the leaves.
fn check_tree(g: &Grammar<char>, tree: &ParseTree) -> usize {
    match tree {
        ParseTree::Leaf(_) => 1,
        ParseTree::Node { variable, production, children } => {
            assert_eq!(g.lhs(*production), *variable);
            let rhs = g.rhs(*production);
            assert_eq!(rhs.len(), children.len());
            for (sym, child) in rhs.iter().zip(children) {
                match child {
                    ParseTree::Leaf(t) => assert_eq!(sym, cfg_toolkit::Symbol::from(*t)),
                    ParseTree::Node { variable, .. } => {
                        assert_eq!(sym, cfg_toolkit::Symbol::from(*variable))
                    }
                }
            }
            children.iter().map(|c| check_tree(g, c)).sum()
        }
    }
}

#[test]
fn test_recognizes_balanced_pairs() {
    let g = balanced();
    assert!(recognize(&g, &[]));
    assert!(recognize(&g, &['a', 'b']));
    assert!(recognize(&g, &['a', 'a', 'b', 'b']));
    assert!(!recognize(&g, &['a']));
    assert!(!recognize(&g, &['b', 'a']));
    assert!(!recognize(&g, &['a', 'b', 'b']));
}

#[test]
fn test_unknown_input_value_rejects() {
    let g = balanced();
    assert!(!recognize(&g, &['a', 'z', 'b']));
}

#[test]
fn test_prediction_filter_is_transparent() {
    let g = balanced();
    let null = compute_null_set(&g);
    let first = compute_first_set(&g, &null);

    for input in [
        vec![],
        vec!['a', 'b'],
        vec!['a', 'a', 'b', 'b'],
        vec!['a'],
        vec!['b'],
        vec!['a', 'b', 'a', 'b'],
    ] {
        let plain = parse(&g, &null, None, &input, false).accepted;
        let filtered = parse(&g, &null, Some(&first), &input, false).accepted;
        assert_eq!(plain, filtered, "FIRST filtering changed {input:?}");
    }
}

#[test]
fn test_parse_tree_expands_productions() {
    let g = balanced();
    let null = compute_null_set(&g);
    let result = parse(&g, &null, None, &['a', 'a', 'b', 'b'], true);
    assert!(result.accepted);
    let tree = result.tree.expect("accepting parse yields a tree");
    assert_eq!(check_tree(&g, &tree), 4);
}

#[test]
fn test_ambiguous_grammar_accepts_and_yields_a_tree() {
    // S → S S | a, input aaa: several derivations exist
    let mut g = Grammar::<char>::new();
    let s = g.get_variable("S");
    let a = g.get_terminal('a');
    g.add_production(s, s + s);
    g.add_production(s, a);

    let null = compute_null_set(&g);
    let result = parse(&g, &null, None, &['a', 'a', 'a'], true);
    assert!(result.accepted);

    let tree = result.tree.expect("at least one valid tree");
    assert_eq!(check_tree(&g, &tree), 3);
    match &tree {
        ParseTree::Node { variable, .. } => assert_eq!(*variable, s),
        ParseTree::Leaf(_) => panic!("root must be the start variable"),
    }
}

#[test]
fn test_nullable_completion_shortcut() {
    // S → A A b; A → ε: only b is in the language
    let mut g = Grammar::<char>::new();
    let s = g.get_variable("S");
    let a_var = g.get_variable("A");
    let b = g.get_terminal('b');
    g.add_production(s, a_var + a_var + b);
    g.add_production(a_var, g.epsilon().clone());

    let null = compute_null_set(&g);
    assert!(parse(&g, &null, None, &['b'], false).accepted);
    assert!(!parse(&g, &null, None, &[], false).accepted);

    let result = parse(&g, &null, None, &['b'], true);
    let tree = result.tree.expect("tree through nullable shortcut");
    assert_eq!(check_tree(&g, &tree), 1);
}

#[test]
fn test_indirectly_nullable_tree_materializes() {
    // S → A b; A → B B; B → ε: A is nullable only through B
    let mut g = Grammar::<char>::new();
    let s = g.get_variable("S");
    let a_var = g.get_variable("A");
    let b_var = g.get_variable("B");
    let b = g.get_terminal('b');
    g.add_production(s, a_var + b);
    g.add_production(a_var, b_var + b_var);
    g.add_production(b_var, g.epsilon().clone());

    let null = compute_null_set(&g);
    let result = parse(&g, &null, None, &['b'], true);
    assert!(result.accepted);
    let tree = result.tree.expect("tree with a nested ε-derivation");
    assert_eq!(check_tree(&g, &tree), 1);
}

#[test]
fn test_tree_renderings() {
    let g = balanced();
    let null = compute_null_set(&g);
    let tree = parse(&g, &null, None, &['a', 'b'], true).tree.unwrap();

    let lisp = tree.to_lisp(&g);
    assert_eq!(lisp, "(S a (S) b)");

    let dot = tree.to_dot(&g);
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("label=\"a\""));

    let plain = tree.to_plain(&g);
    assert_eq!(plain.lines().count(), 4);
}
