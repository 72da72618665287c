//! LL(1) parse table construction.
//!
//! Builds the predictive parse table `M[variable, terminal] →
//! production` from the NULL, FIRST and FOLLOW sets. Conflicting cells
//! do not abort the build: each collision is reported as a structured
//! [`Ll1Conflict`] diagnostic (and a `tracing` warning) and the later
//! assignment is retained.

use std::collections::HashMap;

use tracing::warn;

use crate::analysis::{FirstSets, FollowSets, NullSet};
use crate::grammar::{Alphabet, Grammar, ProductionId};
use crate::pattern::{Capture, Pattern};
use crate::string::SymbolString;
use crate::symbol::{Terminal, Variable};

/// One table-cell collision: `replaced` lost its cell to `kept`.
#[derive(Clone, Copy, Debug)]
pub struct Ll1Conflict {
    pub variable: Variable,
    pub terminal: Terminal,
    pub kept: ProductionId,
    pub replaced: ProductionId,
}

/// The LL(1) parse table, plus the production numbering it was built
/// over and the conflicts found on the way.
pub struct Ll1Table {
    cells: HashMap<(Variable, Terminal), usize>,
    productions: Vec<ProductionId>,
    conflicts: Vec<Ll1Conflict>,
}

impl Ll1Table {
    /// The production to expand `var` by on lookahead `term`.
    pub fn production_for(&self, var: Variable, term: Terminal) -> Option<ProductionId> {
        self.cells.get(&(var, term)).map(|&n| self.productions[n])
    }

    /// All productions in numbering order.
    pub fn productions(&self) -> &[ProductionId] {
        &self.productions
    }

    pub fn conflicts(&self) -> &[Ll1Conflict] {
        &self.conflicts
    }

    pub fn is_ll1(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn num_entries(&self) -> usize {
        self.cells.len()
    }

    /// Iterates over the filled cells.
    pub fn entries(&self) -> impl Iterator<Item = (Variable, Terminal, ProductionId)> + '_ {
        self.cells
            .iter()
            .map(|(&(v, t), &n)| (v, t, self.productions[n]))
    }
}

/// Builds the LL(1) table.
///
/// A production `A → w` lands in cell `(A, a)` iff
/// - `w = ε` and `a ∈ FOLLOW(A)`, or
/// - `w` starts with the terminal `a`, or
/// - `w` starts with a variable `X` and `a ∈ FIRST(X)`, widened to
///   `a ∈ FOLLOW(X)` when the whole of `w` is nullable.
pub fn build_ll1_table<A: Alphabet>(
    g: &Grammar<A>,
    null: &NullSet,
    first: &FirstSets,
    follow: &FollowSets,
) -> Ll1Table {
    // Number the productions in generator order.
    let pcap = Capture::<ProductionId>::new();
    let mut productions = Vec::new();
    let mut numbering = HashMap::new();
    let mut pgen = g.search_productions(&pcap);
    while pgen.match_next(g) {
        numbering.insert(pcap.get(), productions.len());
        productions.push(pcap.get());
    }

    let terminals = {
        let t = Capture::<Terminal>::new();
        let mut matcher = g.search_terminals(&t);
        let mut terminals = Vec::new();
        while matcher.match_next(g) {
            terminals.push(t.get());
        }
        terminals
    };

    let vcap = Capture::<Variable>::new();
    let mut vgen = g.search_variables(&vcap);

    let mut cells: HashMap<(Variable, Terminal), usize> = HashMap::new();
    let mut conflicts = Vec::new();

    while vgen.match_next(g) {
        let var = vcap.get();

        let w = Capture::<SymbolString>::new();
        let pat = Pattern::lhs(var).capture_string(&w).bind_production(&pcap);
        let mut rows: Vec<(ProductionId, SymbolString)> = Vec::new();
        let mut matcher = g.search(&pat);
        while matcher.match_next(g) {
            rows.push((pcap.get(), w.get()));
        }

        for (p, w) in &rows {
            for &a in &terminals {
                let applies = if w.is_empty() {
                    follow.contains(var, a)
                } else if let Some(x) = w.at(0).as_variable() {
                    first.contains(x, a)
                        || (null.is_nullable(x)
                            && null.all_nullable(w)
                            && follow.contains(x, a))
                } else {
                    w.at(0).as_terminal() == Some(a)
                };
                if !applies {
                    continue;
                }

                let n = numbering[p];
                if let Some(old) = cells.insert((var, a), n) {
                    if old != n {
                        warn!(
                            variable = %g.variable_label(var),
                            terminal = %g.terminal_label(a),
                            kept = %g.production_label(*p),
                            replaced = %g.production_label(productions[old]),
                            "LL(1) conflict; keeping the later production"
                        );
                        conflicts.push(Ll1Conflict {
                            variable: var,
                            terminal: a,
                            kept: *p,
                            replaced: productions[old],
                        });
                    }
                }
            }
        }
    }

    Ll1Table { cells, productions, conflicts }
}
