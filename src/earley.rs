//! Earley recognition and parse-tree extraction.
//!
//! The chart is a sequence of columns `S₀…Sₙ` of items
//! `(production, dot, origin)`. Each column is closed under predict
//! (with the nullable-completion shortcut), scan and complete; the
//! input is accepted iff the final column holds a completed start
//! production with origin 0. Completions and scans record back-pointers
//! so that one valid parse tree can be rebuilt by reverse traversal
//! from the accepting item.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::analysis::{FirstSets, NullSet, compute_null_set};
use crate::grammar::{Alphabet, Grammar, ProductionId};
use crate::pattern::Capture;
use crate::symbol::{Symbol, Terminal, Variable};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct ItemKey {
    prod: ProductionId,
    dot: usize,
    origin: usize,
}

/// Where an item came from; `(column, index)` pairs address chart items.
#[derive(Clone, Copy)]
enum Back {
    Scan { pred: (usize, usize) },
    Complete { pred: (usize, usize), child: (usize, usize) },
    Nullable { pred: (usize, usize), var: Variable },
}

struct Item {
    key: ItemKey,
    back: Option<Back>,
}

#[derive(Default)]
struct Column {
    items: Vec<Item>,
    seen: HashSet<ItemKey>,
    predicted: HashSet<Variable>,
}

/// One derivation of (part of) the input.
pub enum ParseTree {
    Leaf(Terminal),
    Node {
        variable: Variable,
        production: ProductionId,
        children: Vec<ParseTree>,
    },
}

/// Outcome of a recognition run.
pub struct EarleyResult {
    pub accepted: bool,
    /// Present iff requested and the input was accepted.
    pub tree: Option<ParseTree>,
}

/// Recognizes `input` against the grammar's start variable.
///
/// `first` enables prediction filtering: predictions of a non-nullable
/// variable whose FIRST set misses the next input terminal are skipped.
/// With `build_tree`, an accepting run also returns one parse tree
/// (ambiguous inputs have more; the first derivation found wins).
///
/// The NULL (and FIRST) sets must be current for the grammar.
///
/// # Panics
/// Panics if the grammar has no start variable.
pub fn parse<A: Alphabet>(
    g: &Grammar<A>,
    null: &NullSet,
    first: Option<&FirstSets>,
    input: &[A],
    build_tree: bool,
) -> EarleyResult {
    let start = g.get_start_variable();

    // An input value the grammar never interned cannot be derived.
    let mut terms = Vec::with_capacity(input.len());
    for value in input {
        match g.terminal_of(value) {
            Some(t) => terms.push(t),
            None => return EarleyResult { accepted: false, tree: None },
        }
    }

    let prods_of = productions_by_variable(g);
    let n = terms.len();
    let mut cols: Vec<Column> = (0..=n).map(|_| Column::default()).collect();

    for &p in prods_of.get(&start).map(Vec::as_slice).unwrap_or(&[]) {
        add_item(&mut cols, 0, ItemKey { prod: p, dot: 0, origin: 0 }, None);
    }

    for i in 0..=n {
        let mut idx = 0;
        while idx < cols[i].items.len() {
            let key = cols[i].items[idx].key;
            let rhs = g.rhs(key.prod);

            if key.dot < rhs.len() {
                let sym = rhs.at(key.dot);
                if let Some(b) = sym.as_variable() {
                    if cols[i].predicted.insert(b) {
                        for &p in prods_of.get(&b).map(Vec::as_slice).unwrap_or(&[]) {
                            if let Some(first) = first {
                                let viable = null.is_nullable(b)
                                    || terms.get(i).is_some_and(|&t| first.contains(b, t));
                                if !viable {
                                    continue;
                                }
                            }
                            add_item(
                                &mut cols,
                                i,
                                ItemKey { prod: p, dot: 0, origin: i },
                                None,
                            );
                        }
                    }
                    if null.is_nullable(b) {
                        add_item(
                            &mut cols,
                            i,
                            ItemKey { prod: key.prod, dot: key.dot + 1, origin: key.origin },
                            Some(Back::Nullable { pred: (i, idx), var: b }),
                        );
                    }
                } else if let Some(t) = sym.as_terminal() {
                    if i < n && terms[i] == t {
                        add_item(
                            &mut cols,
                            i + 1,
                            ItemKey { prod: key.prod, dot: key.dot + 1, origin: key.origin },
                            Some(Back::Scan { pred: (i, idx) }),
                        );
                    }
                }
            } else {
                // complete: advance every item in the origin column that
                // was waiting on this variable
                let b = Symbol::from(g.lhs(key.prod));
                let j = key.origin;
                let mut k = 0;
                while k < cols[j].items.len() {
                    let waiting = cols[j].items[k].key;
                    let wrhs = g.rhs(waiting.prod);
                    if waiting.dot < wrhs.len() && wrhs.at(waiting.dot) == b {
                        add_item(
                            &mut cols,
                            i,
                            ItemKey {
                                prod: waiting.prod,
                                dot: waiting.dot + 1,
                                origin: waiting.origin,
                            },
                            Some(Back::Complete { pred: (j, k), child: (i, idx) }),
                        );
                    }
                    k += 1;
                }
            }
            idx += 1;
        }
    }

    let accepting = cols[n].items.iter().position(|item| {
        let key = item.key;
        g.lhs(key.prod) == start && key.origin == 0 && key.dot == g.rhs(key.prod).len()
    });

    let accepted = accepting.is_some();
    let tree = match accepting {
        Some(at) if build_tree => Some(build_node(g, null, &prods_of, &cols, (n, at))),
        _ => None,
    };
    EarleyResult { accepted, tree }
}

/// Recognizes without options or tree building.
pub fn recognize<A: Alphabet>(g: &Grammar<A>, input: &[A]) -> bool {
    let null = compute_null_set(g);
    parse(g, &null, None, input, false).accepted
}

fn add_item(cols: &mut [Column], col: usize, key: ItemKey, back: Option<Back>) {
    let c = &mut cols[col];
    if c.seen.insert(key) {
        c.items.push(Item { key, back });
    }
}

fn productions_by_variable<A: Alphabet>(
    g: &Grammar<A>,
) -> HashMap<Variable, Vec<ProductionId>> {
    let p = Capture::<ProductionId>::new();
    let mut matcher = g.search_productions(&p);
    let mut map: HashMap<Variable, Vec<ProductionId>> = HashMap::new();
    while matcher.match_next(g) {
        let id = p.get();
        map.entry(g.lhs(id)).or_default().push(id);
    }
    map
}

/// Rebuilds the derivation rooted at a completed item by walking its
/// back-pointer chain right-to-left.
fn build_node<A: Alphabet>(
    g: &Grammar<A>,
    null: &NullSet,
    prods_of: &HashMap<Variable, Vec<ProductionId>>,
    cols: &[Column],
    at: (usize, usize),
) -> ParseTree {
    let root = cols[at.0].items[at.1].key;
    let mut children = Vec::new();
    let mut cur = at;
    loop {
        let item = &cols[cur.0].items[cur.1];
        if item.key.dot == 0 {
            break;
        }
        match item.back.expect("advanced item carries a back-pointer") {
            Back::Scan { pred } => {
                let rhs = g.rhs(item.key.prod);
                let term = rhs
                    .at(item.key.dot - 1)
                    .as_terminal()
                    .expect("scan advanced over a terminal");
                children.push(ParseTree::Leaf(term));
                cur = pred;
            }
            Back::Complete { pred, child } => {
                children.push(build_node(g, null, prods_of, cols, child));
                cur = pred;
            }
            Back::Nullable { pred, var } => {
                children.push(nullable_tree(g, null, prods_of, var));
                cur = pred;
            }
        }
    }
    children.reverse();
    ParseTree::Node {
        variable: g.lhs(root.prod),
        production: root.prod,
        children,
    }
}

/// Materializes one ε-derivation of a nullable variable, guided by the
/// order in which the NULL fixed point proved variables nullable.
fn nullable_tree<A: Alphabet>(
    g: &Grammar<A>,
    null: &NullSet,
    prods_of: &HashMap<Variable, Vec<ProductionId>>,
    var: Variable,
) -> ParseTree {
    let prods = prods_of.get(&var).map(Vec::as_slice).unwrap_or(&[]);

    for &p in prods {
        if g.rhs(p).is_empty() {
            return ParseTree::Node { variable: var, production: p, children: Vec::new() };
        }
    }

    let rank = null.rank(var);
    for &p in prods {
        let rhs = g.rhs(p);
        let usable = rhs.iter().all(|s| {
            s.as_variable()
                .is_some_and(|w| null.is_nullable(w) && null.rank(w) < rank)
        });
        if usable {
            let children = rhs
                .iter()
                .map(|s| nullable_tree(g, null, prods_of, s.as_variable().unwrap()))
                .collect();
            return ParseTree::Node { variable: var, production: p, children };
        }
    }
    unreachable!("nullable variable without an ε-derivation; stale NULL set?")
}

impl ParseTree {
    /// Indented one-node-per-line rendering.
    pub fn to_plain<A: Alphabet>(&self, g: &Grammar<A>) -> String {
        fn rec<A: Alphabet>(tree: &ParseTree, g: &Grammar<A>, depth: usize, out: &mut String) {
            for _ in 0..depth {
                out.push_str("  ");
            }
            match tree {
                ParseTree::Leaf(t) => {
                    let _ = writeln!(out, "{}", g.terminal_label(*t));
                }
                ParseTree::Node { variable, children, .. } => {
                    let _ = writeln!(out, "{}", g.variable_label(*variable));
                    for child in children {
                        rec(child, g, depth + 1, out);
                    }
                }
            }
        }
        let mut out = String::new();
        rec(self, g, 0, &mut out);
        out
    }

    /// S-expression rendering, `(S (a) S' …)` style.
    pub fn to_lisp<A: Alphabet>(&self, g: &Grammar<A>) -> String {
        match self {
            ParseTree::Leaf(t) => g.terminal_label(*t),
            ParseTree::Node { variable, children, .. } => {
                let mut out = format!("({}", g.variable_label(*variable));
                for child in children {
                    out.push(' ');
                    out.push_str(&child.to_lisp(g));
                }
                out.push(')');
                out
            }
        }
    }

    /// Graphviz DOT rendering.
    pub fn to_dot<A: Alphabet>(&self, g: &Grammar<A>) -> String {
        fn rec<A: Alphabet>(
            tree: &ParseTree,
            g: &Grammar<A>,
            next: &mut usize,
            out: &mut String,
        ) -> usize {
            let id = *next;
            *next += 1;
            let label = match tree {
                ParseTree::Leaf(t) => g.terminal_label(*t),
                ParseTree::Node { variable, .. } => g.variable_label(*variable),
            };
            let _ = writeln!(out, "  n{id} [label=\"{}\"];", label.replace('"', "\\\""));
            if let ParseTree::Node { children, .. } = tree {
                for child in children {
                    let cid = rec(child, g, next, out);
                    let _ = writeln!(out, "  n{id} -> n{cid};");
                }
            }
            id
        }
        let mut out = String::from("digraph parse_tree {\n");
        let mut next = 0;
        rec(self, g, &mut next, &mut out);
        out.push_str("}\n");
        out
    }
}
