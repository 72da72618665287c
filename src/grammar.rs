//! Grammar storage: symbol registries and the production store.
//!
//! A [`Grammar`] owns the terminal and variable registries, an arena of
//! production records addressed by stable [`ProductionId`] handles, and
//! the per-variable production lists. Variables and terminals are
//! interned on first lookup and never change identity; productions are
//! deduplicated per variable and tombstoned on removal so that handles
//! held by active generators stay valid.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::pattern::{Capture, Pattern};
use crate::string::SymbolString;
use crate::symbol::{Symbol, Terminal, Variable};

/// Requirements on the terminal alphabet of a grammar: a strict weak
/// ordering for the value→terminal map, cloning for interning, and
/// printing for diagnostics.
pub trait Alphabet: Clone + Ord + fmt::Debug + fmt::Display {}

impl<T: Clone + Ord + fmt::Debug + fmt::Display> Alphabet for T {}

/// Opaque handle to a production record.
///
/// Handles are stable: a tombstoned production keeps its id for as long
/// as anything holds it, and re-adding an equivalent production while
/// the tombstone is retained yields the identical handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ProductionId(pub(crate) u32);

/// One production record in the arena.
pub(crate) struct ProdRecord {
    pub(crate) lhs: Variable,
    pub(crate) rhs: SymbolString,
    pub(crate) deleted: bool,
    /// Storage reclaimed; any handle reaching this record is stale.
    pub(crate) vacant: bool,
    /// Holds: one for the grammar while live, one per generator bound to
    /// this production. Shared so generators can release without a
    /// grammar borrow.
    pub(crate) holds: Rc<Cell<u32>>,
}

/// One variable record.
///
/// `prods` is partitioned: indices `[0, live)` are the live productions
/// in insertion order, the rest are tombstones awaiting release.
pub(crate) struct VarRecord {
    pub(crate) name: Option<String>,
    pub(crate) prods: Vec<ProductionId>,
    pub(crate) live: usize,
    /// Set while the head of the list is the distinguished `V → ε`
    /// production a variable holds when it has no other live production.
    pub(crate) null_prod: Option<ProductionId>,
    pub(crate) deleted: bool,
}

struct TermEntry<A> {
    /// Interned alphabet value; `None` for a variable terminal.
    value: Option<A>,
    /// Interned placeholder name; `None` for an alphabet terminal.
    name: Option<String>,
}

/// A context-free grammar over the alphabet `A`.
///
/// The grammar is a single-writer structure: all mutation goes through
/// `&mut self`, reads and searches through `&self`. Searches are
/// expressed as patterns (see [`crate::pattern`]) advanced by
/// generators (see [`crate::generator`]).
pub struct Grammar<A: Alphabet> {
    terminals: Vec<TermEntry<A>>,
    terminal_ids: BTreeMap<A, Terminal>,
    variable_terminal_ids: IndexMap<String, Terminal>,
    variables: Vec<VarRecord>,
    variable_ids: IndexMap<String, Variable>,
    prods: Vec<ProdRecord>,
    start: Option<Variable>,
    n_productions: usize,
    n_variables: usize,
    /// Upper bound on every `$k` name seen so far, bumped on each
    /// `$`-name insertion and each auto-generated name.
    auto_name_bound: u64,
    epsilon: SymbolString,
}

impl<A: Alphabet> Default for Grammar<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Alphabet> Grammar<A> {
    pub fn new() -> Self {
        Self {
            terminals: Vec::new(),
            terminal_ids: BTreeMap::new(),
            variable_terminal_ids: IndexMap::new(),
            variables: Vec::new(),
            variable_ids: IndexMap::new(),
            prods: Vec::new(),
            start: None,
            n_productions: 0,
            n_variables: 0,
            auto_name_bound: 0,
            epsilon: SymbolString::epsilon(),
        }
    }

    /// The empty symbol string.
    #[inline]
    pub fn epsilon(&self) -> &SymbolString {
        &self.epsilon
    }

    // ------------------------------------------------------------------
    // symbol registry
    // ------------------------------------------------------------------

    /// Interns `value` and returns its terminal, creating it on first
    /// lookup. Terminal ids descend from −1.
    pub fn get_terminal(&mut self, value: A) -> Terminal {
        if let Some(&t) = self.terminal_ids.get(&value) {
            return t;
        }
        let t = self.new_terminal(Some(value.clone()), None);
        self.terminal_ids.insert(value, t);
        t
    }

    /// Looks a value up without interning it.
    pub fn terminal_of(&self, value: &A) -> Option<Terminal> {
        self.terminal_ids.get(value).copied()
    }

    /// Adds or returns an existing variable by name.
    ///
    /// # Panics
    /// Panics if `name` violates the naming rule (a `$` prefix must be
    /// followed by digits only).
    pub fn get_variable(&mut self, name: &str) -> Variable {
        assert!(is_valid_symbol_name(name), "invalid symbol name: {name:?}");
        if let Some(&v) = self.variable_ids.get(name) {
            return v;
        }
        let v = self.add_variable();
        self.variables[v.index()].name = Some(name.to_string());
        self.variable_ids.insert(name.to_string(), v);
        self.note_auto_name(name);
        v
    }

    /// Resolves `name` to a variable symbol: an existing variable, an
    /// existing variable terminal, or a freshly interned variable
    /// terminal if the name is unknown.
    ///
    /// # Panics
    /// Panics if `name` violates the naming rule.
    pub fn get_variable_symbol(&mut self, name: &str) -> Symbol {
        assert!(is_valid_symbol_name(name), "invalid symbol name: {name:?}");
        if let Some(&v) = self.variable_ids.get(name) {
            return v.into();
        }
        if let Some(&t) = self.variable_terminal_ids.get(name) {
            return t.into();
        }
        let t = self.new_terminal(None, Some(name.to_string()));
        self.variable_terminal_ids.insert(name.to_string(), t);
        self.note_auto_name(name);
        t.into()
    }

    /// Adds a fresh anonymous variable.
    ///
    /// Every variable starts with the null production `V → ε`, which
    /// counts as a production. The first variable added becomes the
    /// start variable.
    pub fn add_variable(&mut self) -> Variable {
        let v = Variable(self.variables.len() as i32 + 1);
        self.variables.push(VarRecord {
            name: None,
            prods: Vec::new(),
            live: 0,
            null_prod: None,
            deleted: false,
        });
        let null = self.fresh_record(v, SymbolString::epsilon());
        let vr = &mut self.variables[v.index()];
        vr.prods.push(null);
        vr.live = 1;
        vr.null_prod = Some(null);
        self.n_productions += 1;
        self.n_variables += 1;
        if self.start.is_none() {
            self.start = Some(v);
        }
        v
    }

    /// Looks a variable up by name without interning it.
    pub fn variable_named(&self, name: &str) -> Option<Variable> {
        self.variable_ids.get(name).copied()
    }

    /// The variable's name, if it has one.
    pub fn name_of(&self, var: Variable) -> Option<&str> {
        let vi = self.check_variable(var);
        self.variables[vi].name.as_deref()
    }

    /// The variable's name, generating and recording a fresh `$k` name
    /// above the current upper bound if the variable is anonymous.
    pub fn get_name(&mut self, var: Variable) -> &str {
        let vi = self.check_variable(var);
        if self.variables[vi].name.is_none() {
            let k = self.auto_name_bound + 1;
            self.auto_name_bound = k;
            let name = format!("${k}");
            self.variable_ids.insert(name.clone(), var);
            self.variables[vi].name = Some(name);
        }
        self.variables[vi].name.as_deref().unwrap()
    }

    /// The alphabet value of a terminal.
    ///
    /// # Panics
    /// Panics on an invalid handle or a variable terminal, which has no
    /// alphabet value.
    pub fn get_alpha(&self, term: Terminal) -> &A {
        let ti = self.check_terminal(term);
        self.terminals[ti]
            .value
            .as_ref()
            .expect("variable terminal has no alphabet value")
    }

    /// Checks whether a terminal is a placeholder rather than an
    /// alphabet terminal.
    pub fn is_variable_terminal(&self, term: Terminal) -> bool {
        let ti = self.check_terminal(term);
        self.terminals[ti].name.is_some()
    }

    /// The interned name of a variable terminal.
    pub fn terminal_name(&self, term: Terminal) -> Option<&str> {
        let ti = self.check_terminal(term);
        self.terminals[ti].name.as_deref()
    }

    // ------------------------------------------------------------------
    // counts and lookups
    // ------------------------------------------------------------------

    pub fn num_variables(&self) -> usize {
        self.n_variables
    }

    pub fn num_productions(&self) -> usize {
        self.n_productions
    }

    /// Number of live productions of one variable.
    pub fn num_productions_of(&self, var: Variable) -> usize {
        let vi = self.check_variable(var);
        self.variables[vi].live
    }

    /// Number of interned terminals, variable terminals included. Not
    /// every terminal is necessarily reachable from a production.
    pub fn num_terminals(&self) -> usize {
        self.terminals.len()
    }

    pub fn num_variable_terminals(&self) -> usize {
        self.terminals.iter().filter(|e| e.name.is_some()).count()
    }

    /// Does the variable hold only its default null production?
    pub fn has_default_production(&self, var: Variable) -> bool {
        let vi = self.check_variable(var);
        self.variables[vi].null_prod.is_some()
    }

    /// The start variable.
    ///
    /// # Panics
    /// Panics if no start variable is set.
    pub fn get_start_variable(&self) -> Variable {
        self.start.expect("grammar has no start variable")
    }

    /// The start variable, if one is set.
    pub fn start_variable(&self) -> Option<Variable> {
        self.start
    }

    pub fn set_start_variable(&mut self, var: Variable) {
        self.check_variable(var);
        self.start = Some(var);
    }

    /// Left-hand side of a production.
    ///
    /// # Panics
    /// Panics on a stale or out-of-range handle.
    pub fn lhs(&self, prod: ProductionId) -> Variable {
        self.check_production(prod).lhs
    }

    /// Right-hand side of a production. Reading the symbols of a
    /// tombstoned production is legal while something still holds it.
    ///
    /// # Panics
    /// Panics on a stale or out-of-range handle.
    pub fn rhs(&self, prod: ProductionId) -> SymbolString {
        self.check_production(prod).rhs.clone()
    }

    // ------------------------------------------------------------------
    // production store
    // ------------------------------------------------------------------

    /// Adds the production `var → rhs` and returns its handle.
    ///
    /// Adding a duplicate of a live production returns the existing
    /// handle and changes nothing. Adding a duplicate of a retained
    /// tombstone resurrects it under its old handle. A variable holding
    /// only its null production trades it for the first real production
    /// without changing the production count.
    pub fn add_production(&mut self, var: Variable, rhs: impl Into<SymbolString>) -> ProductionId {
        let rhs: SymbolString = rhs.into();
        let vi = self.check_variable(var);

        if let Some(null) = self.variables[vi].null_prod {
            if rhs.is_empty() {
                return null;
            }
            // Replace the null production: one production is effectively
            // removed and another added, so the count is unchanged.
            let id = self.fresh_record(var, rhs);
            let vr = &mut self.variables[vi];
            debug_assert_eq!(vr.prods.first(), Some(&null));
            debug_assert_eq!(vr.live, 1);
            vr.null_prod = None;
            vr.prods[0] = id;
            self.prods[null.0 as usize].deleted = true;
            self.variables[vi].prods.insert(1, null);
            self.release(null);
            self.sweep_var(vi);
            return id;
        }

        let vr = &self.variables[vi];
        let found = vr
            .prods
            .iter()
            .position(|&q| self.prods[q.0 as usize].rhs == rhs);
        if let Some(pos) = found {
            let p = vr.prods[pos];
            if pos < vr.live {
                return p;
            }
            // Resurrect the tombstone back into the live region.
            self.prods[p.0 as usize].deleted = false;
            self.hold(p);
            let vr = &mut self.variables[vi];
            vr.prods.remove(pos);
            let at = vr.live;
            vr.prods.insert(at, p);
            vr.live += 1;
            self.n_productions += 1;
            return p;
        }

        let id = self.fresh_record(var, rhs);
        let vr = &mut self.variables[vi];
        let at = vr.live;
        vr.prods.insert(at, id);
        vr.live += 1;
        self.n_productions += 1;
        id
    }

    /// Removes a production.
    ///
    /// Removing the null production is a no-op; removing the last other
    /// live production reinstates a null production in its place, so a
    /// variable never ends up without a head. The tombstone is retained
    /// until no generator holds it.
    ///
    /// # Panics
    /// Panics on a stale handle or a production already removed.
    pub fn remove_production(&mut self, prod: ProductionId) {
        let rec = self.check_production(prod);
        assert!(!rec.deleted, "production already removed");
        let var = rec.lhs;
        let vi = var.index();

        if self.variables[vi].null_prod == Some(prod) {
            return;
        }

        let vr = &self.variables[vi];
        let pos = vr.prods[..vr.live]
            .iter()
            .position(|&q| q == prod)
            .expect("live production linked under its variable");

        self.prods[prod.0 as usize].deleted = true;

        if self.variables[vi].live == 1 {
            // Sole live production: reinstate the null production. The
            // count is unchanged, one production replaces another.
            let null = self.fresh_record(var, SymbolString::epsilon());
            let vr = &mut self.variables[vi];
            vr.prods[pos] = null;
            vr.null_prod = Some(null);
            vr.prods.insert(1, prod);
        } else {
            let vr = &mut self.variables[vi];
            vr.prods.remove(pos);
            vr.live -= 1;
            let at = vr.live;
            vr.prods.insert(at, prod);
            self.n_productions -= 1;
        }
        self.release(prod);
        self.sweep_var(vi);
    }

    /// Removes a variable and all of its productions, without touching
    /// productions of other variables that mention it.
    pub fn unsafe_remove_variable(&mut self, var: Variable) {
        let vi = self.check_variable(var);
        let live_ids: Vec<ProductionId> = {
            let vr = &self.variables[vi];
            vr.prods[..vr.live].to_vec()
        };
        for p in live_ids {
            self.prods[p.0 as usize].deleted = true;
            self.release(p);
            self.n_productions -= 1;
        }
        let vr = &mut self.variables[vi];
        vr.live = 0;
        vr.null_prod = None;
        vr.deleted = true;
        self.n_variables -= 1;
        self.sweep_var(vi);
        if self.start == Some(var) {
            self.start = None;
        }
    }

    /// Removes a variable and cascades through the rest of the grammar:
    /// every production mentioning it loses those occurrences, and any
    /// variable that thereby generates nothing but its null production
    /// is removed transitively (a variable producing only the removed
    /// variable goes with it).
    pub fn remove_variable(&mut self, var: Variable) {
        self.unsafe_remove_variable(var);

        let using = Capture::<Variable>::new();
        let prod = Capture::<ProductionId>::new();
        let pat = Pattern::lhs_capture(&using)
            .any_string()
            .sym(var)
            .any_string()
            .bind_production(&prod);
        let mut uses = self.search(&pat);

        while uses.match_next(self) {
            let p = prod.get();
            let before = self.n_productions;
            self.remove_production(p);

            // The production was its variable's last: that variable only
            // generated forms mentioning the removed one, so it goes too.
            if before == self.n_productions {
                self.remove_variable(using.get());
                continue;
            }

            // The generator still holds the tombstone, so its symbols
            // are readable; re-add them with the variable stripped out.
            let stripped: SymbolString = self
                .rhs(p)
                .iter()
                .filter(|&s| s != Symbol::from(var))
                .collect();
            self.add_production(using.get(), stripped);
        }
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn new_terminal(&mut self, value: Option<A>, name: Option<String>) -> Terminal {
        self.terminals.push(TermEntry { value, name });
        Terminal(-(self.terminals.len() as i32))
    }

    fn note_auto_name(&mut self, name: &str) {
        if let Some(digits) = name.strip_prefix('$') {
            if let Ok(k) = digits.parse::<u64>() {
                self.auto_name_bound = self.auto_name_bound.max(k);
            }
        }
    }

    fn fresh_record(&mut self, lhs: Variable, rhs: SymbolString) -> ProductionId {
        let id = ProductionId(self.prods.len() as u32);
        self.prods.push(ProdRecord {
            lhs,
            rhs,
            deleted: false,
            vacant: false,
            holds: Rc::new(Cell::new(1)),
        });
        id
    }

    fn hold(&self, prod: ProductionId) {
        let holds = &self.prods[prod.0 as usize].holds;
        holds.set(holds.get() + 1);
    }

    fn release(&mut self, prod: ProductionId) {
        let rec = &mut self.prods[prod.0 as usize];
        let n = rec.holds.get();
        debug_assert!(n > 0, "release of an unheld production");
        rec.holds.set(n - 1);
    }

    /// Reclaims tombstones of one variable that nothing holds any more.
    /// Their list slots disappear; their ids are never reissued.
    fn sweep_var(&mut self, vi: usize) {
        let live = self.variables[vi].live;
        let dead: Vec<ProductionId> = self.variables[vi].prods.drain(live..).collect();
        let mut kept = Vec::new();
        for p in dead {
            let rec = &mut self.prods[p.0 as usize];
            if rec.holds.get() == 0 {
                rec.vacant = true;
                rec.rhs = SymbolString::epsilon();
            } else {
                kept.push(p);
            }
        }
        self.variables[vi].prods.extend(kept);
    }

    pub(crate) fn check_variable(&self, var: Variable) -> usize {
        let vi = var.index();
        assert!(
            vi < self.variables.len() && !self.variables[vi].deleted,
            "invalid variable handle"
        );
        vi
    }

    fn check_terminal(&self, term: Terminal) -> usize {
        let ti = term.index();
        assert!(ti < self.terminals.len(), "invalid terminal handle");
        ti
    }

    pub(crate) fn check_production(&self, prod: ProductionId) -> &ProdRecord {
        let rec = self
            .prods
            .get(prod.0 as usize)
            .expect("invalid production handle");
        assert!(!rec.vacant, "invalid production handle");
        rec
    }

    // accessors for the generator cursor

    pub(crate) fn variable_space(&self) -> usize {
        self.variables.len()
    }

    pub(crate) fn variable_live_at(&self, vi: usize) -> bool {
        !self.variables[vi].deleted
    }

    pub(crate) fn live_prods(&self, vi: usize) -> &[ProductionId] {
        let vr = &self.variables[vi];
        &vr.prods[..vr.live]
    }

    pub(crate) fn prod_holds(&self, prod: ProductionId) -> Rc<Cell<u32>> {
        Rc::clone(&self.prods[prod.0 as usize].holds)
    }

    // ------------------------------------------------------------------
    // display helpers
    // ------------------------------------------------------------------

    /// Printable label for a variable: its name, or `#id` while it is
    /// anonymous.
    pub fn variable_label(&self, var: Variable) -> String {
        match self.name_of(var) {
            Some(name) => name.to_string(),
            None => format!("#{}", var.id()),
        }
    }

    /// Printable label for a terminal: its alphabet value or its
    /// placeholder name.
    pub fn terminal_label(&self, term: Terminal) -> String {
        let ti = self.check_terminal(term);
        let entry = &self.terminals[ti];
        match (&entry.value, &entry.name) {
            (Some(value), _) => value.to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => unreachable!("terminal with neither value nor name"),
        }
    }

    pub fn symbol_label(&self, sym: Symbol) -> String {
        if let Some(v) = sym.as_variable() {
            self.variable_label(v)
        } else if let Some(t) = sym.as_terminal() {
            self.terminal_label(t)
        } else {
            "ε".to_string()
        }
    }

    /// Printable form of a symbol string, `ε` for the empty string.
    pub fn string_label(&self, s: &SymbolString) -> String {
        if s.is_empty() {
            return "ε".to_string();
        }
        s.iter()
            .map(|sym| self.symbol_label(sym))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Printable form of a production, for example `S → a S b`.
    pub fn production_label(&self, prod: ProductionId) -> String {
        let rec = self.check_production(prod);
        format!(
            "{} → {}",
            self.variable_label(rec.lhs),
            self.string_label(&rec.rhs)
        )
    }
}

/// A name is valid iff it is empty, starts with `$` followed by digits
/// only, or starts with any non-`$` character. This keeps imported
/// names from colliding with auto-generated ones.
fn is_valid_symbol_name(name: &str) -> bool {
    match name.strip_prefix('$') {
        None => true,
        Some(digits) => digits.chars().all(|c| c.is_ascii_digit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_ids_descend_and_intern() {
        let mut g = Grammar::<char>::new();
        let a = g.get_terminal('a');
        let b = g.get_terminal('b');
        assert_ne!(a, b);
        assert_eq!(a, g.get_terminal('a'));
        assert_eq!(g.num_terminals(), 2);
        assert_eq!(*g.get_alpha(a), 'a');
    }

    #[test]
    fn test_variable_symbol_resolution() {
        let mut g = Grammar::<char>::new();
        let s = g.get_variable("S");
        assert_eq!(g.get_variable_symbol("S"), Symbol::from(s));

        // unknown names intern as variable terminals
        let x = g.get_variable_symbol("X");
        assert!(x.is_terminal());
        let xt = x.as_terminal().unwrap();
        assert!(g.is_variable_terminal(xt));
        assert_eq!(g.terminal_name(xt), Some("X"));
        assert_eq!(g.get_variable_symbol("X"), x);
        assert_eq!(g.num_variable_terminals(), 1);
    }

    #[test]
    fn test_new_variable_has_null_production() {
        let mut g = Grammar::<char>::new();
        let v = g.add_variable();
        assert!(g.has_default_production(v));
        assert_eq!(g.num_productions(), 1);
        assert_eq!(g.num_productions_of(v), 1);
        assert_eq!(g.get_start_variable(), v);
    }

    #[test]
    fn test_auto_names_stay_above_registered_dollar_names() {
        let mut g = Grammar::<char>::new();
        g.get_variable("$7");
        let v = g.add_variable();
        assert_eq!(g.get_name(v), "$8");
        let w = g.add_variable();
        assert_eq!(g.get_name(w), "$9");
    }

    #[test]
    #[should_panic(expected = "invalid symbol name")]
    fn test_dollar_names_must_be_numeric() {
        let mut g = Grammar::<char>::new();
        g.get_variable("$x1");
    }

    #[test]
    fn test_null_replacement_keeps_count() {
        let mut g = Grammar::<char>::new();
        let v = g.add_variable();
        let a = g.get_terminal('a');
        assert_eq!(g.num_productions(), 1);
        let p = g.add_production(v, a);
        assert_eq!(g.num_productions(), 1);
        assert!(!g.has_default_production(v));
        assert_eq!(g.rhs(p), SymbolString::from(a));
    }

    #[test]
    fn test_add_epsilon_on_fresh_variable_returns_null_production() {
        let mut g = Grammar::<char>::new();
        let v = g.add_variable();
        let p = g.add_production(v, g.epsilon().clone());
        assert!(g.has_default_production(v));
        assert!(g.rhs(p).is_empty());
        assert_eq!(g.num_productions(), 1);
    }
}
