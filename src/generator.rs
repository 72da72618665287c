//! Generators: lazy cursors over search results.
//!
//! A [`Generator`] walks the grammar in its intrinsic order — variables
//! by ascending id, live productions of a variable in insertion order —
//! and yields one result per [`Generator::match_next`] call, writing
//! bindings into the caller's captures. Tombstoned productions and
//! removed variables are never yielded.
//!
//! Two mutations are supported while a generator is active: removing
//! the production it is currently bound to, and adding productions to a
//! variable the cursor has not visited yet. The generator keeps a hold
//! on its bound production so the tombstone outlives the binding; the
//! hold is released on the next advance, on rewind and on drop.

use std::cell::Cell;
use std::rc::Rc;

use crate::grammar::{Alphabet, Grammar, ProductionId};
use crate::pattern::{Capture, Pattern};
use crate::symbol::{Symbol, Terminal, Variable};

enum GenKind {
    Productions(Capture<ProductionId>),
    Variables(Capture<Variable>),
    Terminals(Capture<Terminal>),
    Symbols(Capture<Symbol>),
    Pattern(Pattern),
}

/// Where the production cursor stopped: the production yielded last,
/// its list position, and the production that followed it at yield
/// time. The successor re-anchors the cursor when the bound production
/// is removed out from under it.
#[derive(Clone, Copy)]
struct CursorMark {
    id: ProductionId,
    idx: usize,
    next: Option<ProductionId>,
}

/// A lazy cursor yielding matches for a search.
pub struct Generator {
    kind: GenKind,
    /// Variable index the production cursor is parked on.
    vi: usize,
    last: Option<CursorMark>,
    /// Terminal cursor.
    ti: usize,
    /// In symbol mode, variables are exhausted before terminals.
    in_terminals: bool,
    held: Option<Rc<Cell<u32>>>,
    done: bool,
}

impl Generator {
    fn new(kind: GenKind) -> Self {
        Self {
            kind,
            vi: 0,
            last: None,
            ti: 0,
            in_terminals: false,
            held: None,
            done: false,
        }
    }

    /// Advances to the next match. On success the pattern's holes carry
    /// fresh bindings; on exhaustion every further call returns false
    /// until [`Generator::rewind`].
    pub fn match_next<A: Alphabet>(&mut self, g: &Grammar<A>) -> bool {
        if self.done {
            return false;
        }
        release(&mut self.held);

        match &self.kind {
            GenKind::Variables(c) => {
                while self.vi < g.variable_space() {
                    let vi = self.vi;
                    self.vi += 1;
                    if g.variable_live_at(vi) {
                        c.set(Variable(vi as i32 + 1));
                        return true;
                    }
                }
            }
            GenKind::Terminals(c) => {
                if self.ti < g.num_terminals() {
                    let t = Terminal(-(self.ti as i32) - 1);
                    self.ti += 1;
                    c.set(t);
                    return true;
                }
            }
            GenKind::Symbols(c) => {
                if !self.in_terminals {
                    while self.vi < g.variable_space() {
                        let vi = self.vi;
                        self.vi += 1;
                        if g.variable_live_at(vi) {
                            c.set(Symbol(vi as i32 + 1));
                            return true;
                        }
                    }
                    self.in_terminals = true;
                }
                if self.ti < g.num_terminals() {
                    let s = Symbol(-(self.ti as i32) - 1);
                    self.ti += 1;
                    c.set(s);
                    return true;
                }
            }
            GenKind::Productions(c) => {
                while self.vi < g.variable_space() {
                    if !g.variable_live_at(self.vi) {
                        self.vi += 1;
                        self.last = None;
                        continue;
                    }
                    let live = g.live_prods(self.vi);
                    if let Some(start) = resume_at(self.last, live) {
                        if let Some(&p) = live.get(start) {
                            c.set(p);
                            self.last = Some(CursorMark {
                                id: p,
                                idx: start,
                                next: live.get(start + 1).copied(),
                            });
                            self.held = Some(hold(g, p));
                            return true;
                        }
                    }
                    self.vi += 1;
                    self.last = None;
                }
            }
            GenKind::Pattern(pat) => {
                while self.vi < g.variable_space() {
                    if !g.variable_live_at(self.vi) {
                        self.vi += 1;
                        self.last = None;
                        continue;
                    }
                    let live = g.live_prods(self.vi);
                    if let Some(start) = resume_at(self.last, live) {
                        let mut i = start;
                        while i < live.len() {
                            let p = live[i];
                            let rec = g.check_production(p);
                            if pat.try_match(rec.lhs, &rec.rhs) {
                                if let Some(c) = pat.production_capture() {
                                    c.set(p);
                                }
                                self.last = Some(CursorMark {
                                    id: p,
                                    idx: i,
                                    next: live.get(i + 1).copied(),
                                });
                                self.held = Some(hold(g, p));
                                return true;
                            }
                            i += 1;
                        }
                    }
                    self.vi += 1;
                    self.last = None;
                }
            }
        }

        self.done = true;
        false
    }

    /// Resets the cursor to the beginning, releasing any held
    /// production.
    pub fn rewind(&mut self) {
        release(&mut self.held);
        self.vi = 0;
        self.last = None;
        self.ti = 0;
        self.in_terminals = false;
        self.done = false;
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        release(&mut self.held);
    }
}

fn release(held: &mut Option<Rc<Cell<u32>>>) {
    if let Some(h) = held.take() {
        debug_assert!(h.get() > 0);
        h.set(h.get() - 1);
    }
}

fn hold<A: Alphabet>(g: &Grammar<A>, p: ProductionId) -> Rc<Cell<u32>> {
    let holds = g.prod_holds(p);
    holds.set(holds.get() + 1);
    holds
}

/// Position to continue from within one variable's live list, or `None`
/// when the variable is exhausted. If the production yielded last is
/// still live, continue past it; if it was removed, continue at its
/// recorded successor — and a removed production that had no successor
/// ends the variable, so a null production reinstated in its place is
/// not yielded.
fn resume_at(last: Option<CursorMark>, live: &[ProductionId]) -> Option<usize> {
    let Some(mark) = last else { return Some(0) };
    if live.get(mark.idx) == Some(&mark.id) {
        return Some(mark.idx + 1);
    }
    if let Some(pos) = live.iter().position(|&q| q == mark.id) {
        return Some(pos + 1);
    }
    match mark.next {
        None => None,
        Some(succ) => match live.iter().position(|&q| q == succ) {
            Some(pos) => Some(pos),
            None => Some(mark.idx.min(live.len())),
        },
    }
}

impl<A: Alphabet> Grammar<A> {
    /// Searches all productions matching a pattern.
    pub fn search(&self, pattern: &Pattern) -> Generator {
        Generator::new(GenKind::Pattern(pattern.clone()))
    }

    /// Yields every live production.
    pub fn search_productions(&self, capture: &Capture<ProductionId>) -> Generator {
        Generator::new(GenKind::Productions(capture.clone()))
    }

    /// Yields every live variable in ascending id order.
    pub fn search_variables(&self, capture: &Capture<Variable>) -> Generator {
        Generator::new(GenKind::Variables(capture.clone()))
    }

    /// Yields every interned terminal, variable terminals included.
    pub fn search_terminals(&self, capture: &Capture<Terminal>) -> Generator {
        Generator::new(GenKind::Terminals(capture.clone()))
    }

    /// Yields every symbol: live variables first, then terminals.
    pub fn search_symbols(&self, capture: &Capture<Symbol>) -> Generator {
        Generator::new(GenKind::Symbols(capture.clone()))
    }
}
