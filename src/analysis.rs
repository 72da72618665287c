//! NULL, FIRST and FOLLOW set computations.
//!
//! All three are fixed points over the grammar's productions, iterated
//! through the pattern/generator surface. Sets are bit vectors: the
//! NULL set is keyed by variable index, FIRST and FOLLOW are one bit
//! vector per variable keyed by terminal index, with one extra bit
//! position past the last terminal reserved for the end-of-input
//! marker (only ever set in FOLLOW).

use vob::Vob;

use crate::grammar::{Alphabet, Grammar};
use crate::pattern::{Capture, Pattern};
use crate::string::SymbolString;
use crate::symbol::{Terminal, Variable};

/// The set of nullable variables: those that derive ε.
pub struct NullSet {
    bits: Vob,
    /// Monotone mark order; a variable was proven nullable by a
    /// production whose variables all carry strictly smaller ranks.
    /// Used to materialize a finite ε-derivation.
    ranks: Vec<u32>,
}

impl NullSet {
    pub fn is_nullable(&self, var: Variable) -> bool {
        var.index() < self.bits.len() && self.bits[var.index()]
    }

    /// Checks whether every symbol of `s` is a nullable variable.
    pub fn all_nullable(&self, s: &SymbolString) -> bool {
        s.iter()
            .all(|sym| sym.as_variable().is_some_and(|v| self.is_nullable(v)))
    }

    pub(crate) fn rank(&self, var: Variable) -> u32 {
        self.ranks[var.index()]
    }
}

/// FIRST sets: for each variable, the terminals that can begin one of
/// its derivations. A terminal's own FIRST is the singleton of itself
/// and is not stored.
pub struct FirstSets {
    sets: Vec<Vob>,
}

impl FirstSets {
    pub fn contains(&self, var: Variable, term: Terminal) -> bool {
        var.index() < self.sets.len() && self.sets[var.index()][term.index()]
    }

    pub(crate) fn set_of(&self, var: Variable) -> &Vob {
        &self.sets[var.index()]
    }
}

/// FOLLOW sets: for each variable, the terminals that can appear right
/// after it in a sentential form from the start variable, plus the
/// end-of-input marker.
pub struct FollowSets {
    sets: Vec<Vob>,
    end: usize,
}

impl FollowSets {
    pub fn contains(&self, var: Variable, term: Terminal) -> bool {
        var.index() < self.sets.len() && self.sets[var.index()][term.index()]
    }

    /// Does the set contain the end-of-input marker?
    pub fn contains_end(&self, var: Variable) -> bool {
        var.index() < self.sets.len() && self.sets[var.index()][self.end]
    }
}

/// Computes the set of nullable variables as a least fixed point:
/// a variable is nullable iff some production's right-hand side is made
/// entirely of nullable variables (vacuously, the null production).
pub fn compute_null_set<A: Alphabet>(g: &Grammar<A>) -> NullSet {
    let space = g.variable_space();
    let mut bits = empty_set(space);
    let mut ranks = vec![0u32; space];
    let mut next_rank = 1u32;

    let lhs = Capture::<Variable>::new();
    let rhs = Capture::<SymbolString>::new();
    let pat = Pattern::lhs_capture(&lhs).capture_string(&rhs);
    let mut matcher = g.search(&pat);

    loop {
        let mut changed = false;
        matcher.rewind();
        while matcher.match_next(g) {
            let vi = lhs.get().index();
            if bits[vi] {
                continue;
            }
            let nullable = rhs
                .get()
                .iter()
                .all(|sym| sym.as_variable().is_some_and(|w| bits[w.index()]));
            if nullable {
                bits.set(vi, true);
                ranks[vi] = next_rank;
                next_rank += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    NullSet { bits, ranks }
}

/// Computes the FIRST sets of all variables.
pub fn compute_first_set<A: Alphabet>(g: &Grammar<A>, null: &NullSet) -> FirstSets {
    let width = g.num_terminals() + 1;
    let mut sets = vec![empty_set(width); g.variable_space()];

    let lhs = Capture::<Variable>::new();
    let rhs = Capture::<SymbolString>::new();
    let pat = Pattern::lhs_capture(&lhs).capture_string(&rhs);
    let mut matcher = g.search(&pat);

    loop {
        let mut changed = false;
        matcher.rewind();
        while matcher.match_next(g) {
            let vi = lhs.get().index();
            for sym in rhs.get().iter() {
                if let Some(t) = sym.as_terminal() {
                    changed |= sets[vi].set(t.index(), true);
                    break;
                }
                let w = sym.as_variable().unwrap();
                changed |= union_into(&mut sets, vi, w.index());
                if !null.is_nullable(w) {
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }

    FirstSets { sets }
}

/// Computes the FOLLOW sets of all variables. The start variable's set
/// contains the end-of-input marker.
///
/// # Panics
/// Panics if the grammar has no start variable.
pub fn compute_follow_set<A: Alphabet>(
    g: &Grammar<A>,
    null: &NullSet,
    first: &FirstSets,
) -> FollowSets {
    let end = g.num_terminals();
    let mut sets = vec![empty_set(end + 1); g.variable_space()];
    sets[g.get_start_variable().index()].set(end, true);

    let lhs = Capture::<Variable>::new();
    let rhs = Capture::<SymbolString>::new();
    let pat = Pattern::lhs_capture(&lhs).capture_string(&rhs);
    let mut matcher = g.search(&pat);

    loop {
        let mut changed = false;
        matcher.rewind();
        while matcher.match_next(g) {
            let a = lhs.get().index();
            let s = rhs.get();
            let syms = s.as_slice();
            for (i, sym) in syms.iter().enumerate() {
                let Some(v) = sym.as_variable() else { continue };
                let vi = v.index();

                // FIRST(β) \ {ε} flows into FOLLOW(V); if β is entirely
                // nullable, FOLLOW(A) flows in as well.
                let mut beta_nullable = true;
                for &b in &syms[i + 1..] {
                    if let Some(t) = b.as_terminal() {
                        changed |= sets[vi].set(t.index(), true);
                        beta_nullable = false;
                        break;
                    }
                    let w = b.as_variable().unwrap();
                    changed |= sets[vi].or(first.set_of(w));
                    if !null.is_nullable(w) {
                        beta_nullable = false;
                        break;
                    }
                }
                if beta_nullable {
                    changed |= union_into(&mut sets, vi, a);
                }
            }
        }
        if !changed {
            break;
        }
    }

    FollowSets { sets, end }
}

fn empty_set(len: usize) -> Vob {
    let mut set = Vob::with_capacity(len);
    set.resize(len, false);
    set
}

/// `sets[dst] |= sets[src]`, reporting whether `dst` changed.
fn union_into(sets: &mut [Vob], dst: usize, src: usize) -> bool {
    if dst == src {
        return false;
    }
    if dst < src {
        let (left, right) = sets.split_at_mut(src);
        left[dst].or(&right[0])
    } else {
        let (left, right) = sets.split_at_mut(dst);
        right[0].or(&left[src])
    }
}
