//! End-to-end tests: text format in, transforms and parsers out

use cfg_toolkit::analysis::{compute_first_set, compute_follow_set, compute_null_set};
use cfg_toolkit::cli::{format_grammar, parse_grammar};
use cfg_toolkit::earley::{parse, recognize};
use cfg_toolkit::ll1::build_ll1_table;
use cfg_toolkit::remove_lr::remove_left_recursion;

fn tokens(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

#[test]
fn test_expression_grammar_end_to_end() {
    let text = "\
E -> E + T | T
T -> T * F | F
F -> ( E ) | id
";
    let mut g = parse_grammar(text).unwrap();
    assert_eq!(g.num_variables(), 3);

    // the raw grammar is left recursive but Earley handles it as-is
    let null = compute_null_set(&g);
    assert!(parse(&g, &null, None, &tokens("id + id * id"), false).accepted);
    assert!(!parse(&g, &null, None, &tokens("id + + id"), false).accepted);

    // after LR removal the language is intact and LL(1) construction
    // finds no conflicts
    remove_left_recursion(&mut g).unwrap();
    assert!(recognize(&g, &tokens("id")));
    assert!(recognize(&g, &tokens("( id + id ) * id")));
    assert!(!recognize(&g, &tokens("id +")));

    let null = compute_null_set(&g);
    let first = compute_first_set(&g, &null);
    let follow = compute_follow_set(&g, &null, &first);
    let table = build_ll1_table(&g, &null, &first, &follow);
    assert!(table.is_ll1(), "the rewritten expression grammar is LL(1)");
}

#[test]
fn test_rewritten_grammar_survives_a_format_round_trip() {
    let text = "\
E -> E + T | T
T -> id
";
    let mut g = parse_grammar(text).unwrap();
    remove_left_recursion(&mut g).unwrap();

    let rendered = format_grammar(&mut g);
    assert!(rendered.contains("$1"), "tail variable is printed by name");

    let again = parse_grammar(&rendered).unwrap();
    assert_eq!(again.num_variables(), g.num_variables());
    assert_eq!(again.num_productions(), g.num_productions());
    assert!(recognize(&again, &tokens("id + id + id")));
    assert!(!recognize(&again, &tokens("+ id")));
}

#[test]
fn test_parse_trees_from_text_grammars() {
    let text = "\
S -> a S b | ε
";
    let g = parse_grammar(text).unwrap();
    let null = compute_null_set(&g);
    let result = parse(&g, &null, None, &tokens("a a b b"), true);
    assert!(result.accepted);
    let tree = result.tree.unwrap();
    assert_eq!(tree.to_lisp(&g), "(S a (S a (S) b) b)");
}
