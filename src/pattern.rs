//! Pattern DSL: partially specified productions with binding holes.
//!
//! A pattern describes a production shape — a left-hand side that is a
//! literal variable, a hole, or a wildcard, and a right-hand side built
//! from literal symbols and strings, the one-symbol wildcard
//! ([`Pattern::any_sym`]), the any-sequence wildcard
//! ([`Pattern::any_string`]) and typed capture holes. Matching a
//! production against a pattern segments its right-hand side over the
//! pattern's slots and, on success, writes each hole's binding into the
//! caller's [`Capture`]s.
//!
//! Patterns are reusable across productions and grammars; all per-match
//! state lives in the captures.
//!
//! ```
//! # use cfg_toolkit::grammar::Grammar;
//! # use cfg_toolkit::pattern::{Capture, Pattern};
//! # use cfg_toolkit::string::SymbolString;
//! let mut g = Grammar::<char>::new();
//! let s = g.add_variable();
//! let a = g.get_terminal('a');
//! let b = g.get_terminal('b');
//! g.add_production(s, a + s + b);
//!
//! // S → a ~x  destructures the tail after the leading `a`.
//! let x = Capture::<SymbolString>::new();
//! let pat = Pattern::lhs(s).sym(a).capture_string(&x);
//! let mut found = g.search(&pat);
//! assert!(found.match_next(&g));
//! assert_eq!(x.get(), s + b);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::grammar::ProductionId;
use crate::string::SymbolString;
use crate::symbol::{Symbol, Terminal, Variable};

/// A binding hole observed by the caller.
///
/// A capture starts unbound; each successful match rebinds it, and the
/// caller sees the latest binding. Cloning a capture shares the slot,
/// which is how a pattern and its caller communicate.
pub struct Capture<T> {
    slot: Rc<RefCell<Option<T>>>,
}

impl<T> Capture<T> {
    pub fn new() -> Self {
        Self { slot: Rc::new(RefCell::new(None)) }
    }

    pub(crate) fn set(&self, value: T) {
        *self.slot.borrow_mut() = Some(value);
    }
}

impl<T: Clone> Capture<T> {
    /// The latest binding.
    ///
    /// # Panics
    /// Panics if the capture has never been bound.
    pub fn get(&self) -> T {
        self.slot
            .borrow()
            .clone()
            .expect("capture read before any match")
    }

    /// The latest binding, if any match has bound it.
    pub fn try_get(&self) -> Option<T> {
        self.slot.borrow().clone()
    }
}

impl<T> Clone for Capture<T> {
    fn clone(&self) -> Self {
        Self { slot: Rc::clone(&self.slot) }
    }
}

impl<T> Default for Capture<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
enum Lhs {
    Var(Variable),
    Bind(Capture<Variable>),
    Any,
}

#[derive(Clone)]
enum Slot {
    /// A fixed symbol that must match exactly one symbol.
    Sym(Symbol),
    /// `_`: exactly one symbol of any kind.
    AnyOne,
    /// `__`: any possibly-empty sequence.
    AnyStr,
    BindSym(Capture<Symbol>),
    BindTerm(Capture<Terminal>),
    BindVar(Capture<Variable>),
    BindStr(Capture<SymbolString>),
}

/// Bindings are buffered during segmentation and committed only when
/// the whole production matched, so a failed match leaves every capture
/// untouched.
enum Pending {
    Sym(Capture<Symbol>, Symbol),
    Term(Capture<Terminal>, Terminal),
    Var(Capture<Variable>, Variable),
    Str(Capture<SymbolString>, SymbolString),
}

impl Pending {
    fn commit(self) {
        match self {
            Pending::Sym(c, v) => c.set(v),
            Pending::Term(c, v) => c.set(v),
            Pending::Var(c, v) => c.set(v),
            Pending::Str(c, v) => c.set(v),
        }
    }
}

/// A compiled, reusable production pattern.
#[derive(Clone)]
pub struct Pattern {
    lhs: Lhs,
    slots: Vec<Slot>,
    prod: Option<Capture<ProductionId>>,
}

impl Pattern {
    /// Pattern whose left-hand side must be `var`.
    pub fn lhs(var: Variable) -> Self {
        Self { lhs: Lhs::Var(var), slots: Vec::new(), prod: None }
    }

    /// Pattern whose left-hand side is a hole bound on every match.
    pub fn lhs_capture(capture: &Capture<Variable>) -> Self {
        Self { lhs: Lhs::Bind(capture.clone()), slots: Vec::new(), prod: None }
    }

    /// Pattern matching any left-hand side without binding it.
    pub fn any_lhs() -> Self {
        Self { lhs: Lhs::Any, slots: Vec::new(), prod: None }
    }

    /// Appends a literal symbol.
    pub fn sym(mut self, sym: impl Into<Symbol>) -> Self {
        self.slots.push(Slot::Sym(sym.into()));
        self
    }

    /// Appends a literal symbol string (its symbols become fixed slots).
    pub fn string(mut self, s: &SymbolString) -> Self {
        self.slots.extend(s.iter().map(Slot::Sym));
        self
    }

    /// Appends `_`: exactly one symbol of any kind.
    pub fn any_sym(mut self) -> Self {
        self.slots.push(Slot::AnyOne);
        self
    }

    /// Appends `__`: any possibly-empty sequence of symbols.
    pub fn any_string(mut self) -> Self {
        self.slots.push(Slot::AnyStr);
        self
    }

    /// Appends a one-symbol hole.
    pub fn capture_sym(mut self, capture: &Capture<Symbol>) -> Self {
        self.slots.push(Slot::BindSym(capture.clone()));
        self
    }

    /// Appends a one-symbol hole that only matches a terminal.
    pub fn capture_terminal(mut self, capture: &Capture<Terminal>) -> Self {
        self.slots.push(Slot::BindTerm(capture.clone()));
        self
    }

    /// Appends a one-symbol hole that only matches a variable.
    pub fn capture_variable(mut self, capture: &Capture<Variable>) -> Self {
        self.slots.push(Slot::BindVar(capture.clone()));
        self
    }

    /// Appends a possibly-empty sequence hole.
    pub fn capture_string(mut self, capture: &Capture<SymbolString>) -> Self {
        self.slots.push(Slot::BindStr(capture.clone()));
        self
    }

    /// Additionally binds each matched production itself.
    pub fn bind_production(mut self, capture: &Capture<ProductionId>) -> Self {
        self.prod = Some(capture.clone());
        self
    }

    pub(crate) fn production_capture(&self) -> Option<&Capture<ProductionId>> {
        self.prod.as_ref()
    }

    /// Matches one production against this pattern, committing bindings
    /// only on success.
    pub(crate) fn try_match(&self, lhs: Variable, rhs: &SymbolString) -> bool {
        match &self.lhs {
            Lhs::Var(v) if *v != lhs => return false,
            _ => {}
        }

        let mut pending = Vec::new();
        if !match_slots(&self.slots, rhs.as_slice(), &mut pending) {
            return false;
        }

        if let Lhs::Bind(c) = &self.lhs {
            c.set(lhs);
        }
        for bind in pending {
            bind.commit();
        }
        true
    }
}

/// Segments `syms` over `slots`. Fixed symbols and one-symbol holes
/// consume exactly one symbol; sequence holes absorb the residual,
/// longest-first, backtracking one symbol at a time when a later slot
/// would otherwise starve.
fn match_slots(slots: &[Slot], syms: &[Symbol], pending: &mut Vec<Pending>) -> bool {
    let Some((slot, rest)) = slots.split_first() else {
        return syms.is_empty();
    };
    match slot {
        Slot::Sym(s) => syms.first() == Some(s) && match_slots(rest, &syms[1..], pending),
        Slot::AnyOne => !syms.is_empty() && match_slots(rest, &syms[1..], pending),
        Slot::BindSym(c) => {
            let Some(&sym) = syms.first() else { return false };
            pending.push(Pending::Sym(c.clone(), sym));
            if match_slots(rest, &syms[1..], pending) {
                true
            } else {
                pending.pop();
                false
            }
        }
        Slot::BindTerm(c) => {
            let Some(term) = syms.first().and_then(|s| s.as_terminal()) else {
                return false;
            };
            pending.push(Pending::Term(c.clone(), term));
            if match_slots(rest, &syms[1..], pending) {
                true
            } else {
                pending.pop();
                false
            }
        }
        Slot::BindVar(c) => {
            let Some(var) = syms.first().and_then(|s| s.as_variable()) else {
                return false;
            };
            pending.push(Pending::Var(c.clone(), var));
            if match_slots(rest, &syms[1..], pending) {
                true
            } else {
                pending.pop();
                false
            }
        }
        Slot::AnyStr => {
            for take in (0..=syms.len()).rev() {
                if match_slots(rest, &syms[take..], pending) {
                    return true;
                }
            }
            false
        }
        Slot::BindStr(c) => {
            for take in (0..=syms.len()).rev() {
                pending.push(Pending::Str(c.clone(), SymbolString::new(&syms[..take])));
                if match_slots(rest, &syms[take..], pending) {
                    return true;
                }
                pending.pop();
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    #[test]
    fn test_epsilon_matches_only_empty_friendly_patterns() {
        let mut g = Grammar::<char>::new();
        let s = g.add_variable();
        let eps = g.epsilon().clone();

        assert!(Pattern::lhs(s).try_match(s, &eps));
        assert!(Pattern::lhs(s).any_string().try_match(s, &eps));
        assert!(!Pattern::lhs(s).any_sym().try_match(s, &eps));

        let x = Capture::<SymbolString>::new();
        assert!(Pattern::lhs(s).capture_string(&x).try_match(s, &eps));
        assert!(x.get().is_empty());
    }

    #[test]
    fn test_typed_holes_enforce_kind() {
        let mut g = Grammar::<char>::new();
        let s = g.add_variable();
        let a = g.get_terminal('a');
        let rhs: SymbolString = a.into();

        let t = Capture::<Terminal>::new();
        let v = Capture::<Variable>::new();
        assert!(Pattern::lhs(s).capture_terminal(&t).try_match(s, &rhs));
        assert_eq!(t.get(), a);
        assert!(!Pattern::lhs(s).capture_variable(&v).try_match(s, &rhs));
        assert!(v.try_get().is_none());
    }

    #[test]
    fn test_failed_match_leaves_captures_untouched() {
        let mut g = Grammar::<char>::new();
        let s = g.add_variable();
        let a = g.get_terminal('a');
        let b = g.get_terminal('b');

        let x = Capture::<Symbol>::new();
        let pat = Pattern::lhs(s).capture_sym(&x).sym(b);
        // a b matches, a a does not
        assert!(pat.try_match(s, &(a + b)));
        assert_eq!(x.get(), Symbol::from(a));
        assert!(!pat.try_match(s, &(a + a)));
        assert_eq!(x.get(), Symbol::from(a), "binding from the last success stays");
    }

    #[test]
    fn test_earliest_sequence_hole_is_longest() {
        let mut g = Grammar::<char>::new();
        let s = g.add_variable();
        let a = g.get_terminal('a');

        let front = Capture::<SymbolString>::new();
        let back = Capture::<SymbolString>::new();
        let pat = Pattern::lhs(s).capture_string(&front).capture_string(&back);
        assert!(pat.try_match(s, &(a + a + a)));
        assert_eq!(front.get().len(), 3);
        assert!(back.get().is_empty());
    }

    #[test]
    fn test_sequence_hole_backtracks_for_fixed_anchor() {
        let mut g = Grammar::<char>::new();
        let s = g.add_variable();
        let a = g.get_terminal('a');
        let b = g.get_terminal('b');

        // __ b __  against  a b a b: the first hole stretches to the
        // *last* b it can take while still leaving the anchor satisfied.
        let front = Capture::<SymbolString>::new();
        let back = Capture::<SymbolString>::new();
        let pat = Pattern::lhs(s)
            .capture_string(&front)
            .sym(b)
            .capture_string(&back);
        assert!(pat.try_match(s, &(a + b + a + b)));
        assert_eq!(front.get(), a + b + a);
        assert!(back.get().is_empty());
    }

    #[test]
    fn test_misaligned_fixed_symbols_do_not_match() {
        let mut g = Grammar::<char>::new();
        let s = g.add_variable();
        let a = g.get_terminal('a');
        let b = g.get_terminal('b');

        let pat = Pattern::lhs(s).any_string().sym(b).sym(b).any_string();
        assert!(!pat.try_match(s, &(a + b + a)));
        assert!(pat.try_match(s, &(a + b + b)));
    }
}
