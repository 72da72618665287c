//! Left-recursion removal.
//!
//! Rewrites a grammar into one generating the same language in which no
//! variable `V` admits a derivation `V ⇒⁺ V γ`, direct or indirect.

use tracing::debug;

use crate::analysis::{NullSet, compute_null_set};
use crate::error::{GrammarError, Result};
use crate::grammar::{Alphabet, Grammar, ProductionId};
use crate::pattern::{Capture, Pattern};
use crate::string::SymbolString;
use crate::symbol::{Symbol, Variable};

/// Substitution steps allowed while exposing one hidden occurrence.
/// A nullable prefix that regenerates itself (`A → A A | ε`) never
/// converges; exceeding the bound reports the grammar unproductive.
const MAX_PREFIX_EXPANSIONS: usize = 128;

/// Removes all direct and indirect left recursion.
///
/// Variables are processed in ascending id order. For each variable,
/// occurrences of already-processed variables (and of the variable
/// itself) that hide behind a prefix of nullable variables are first
/// exposed by substituting the prefix away; productions leading with an
/// earlier variable are then expanded through that variable's current
/// productions, and immediate left recursion is eliminated by
/// introducing a fresh `$k`-named tail variable.
///
/// Fails with [`GrammarError::UnproductiveGrammar`] when a
/// left-recursive variable has no non-left-recursive alternative to
/// bottom out with, or when a nullable prefix keeps regenerating
/// itself.
pub fn remove_left_recursion<A: Alphabet>(g: &mut Grammar<A>) -> Result<()> {
    let order = {
        let v = Capture::<Variable>::new();
        let mut matcher = g.search_variables(&v);
        let mut order = Vec::new();
        while matcher.match_next(g) {
            order.push(v.get());
        }
        order
    };

    for (i, &var) in order.iter().enumerate() {
        for &earlier in &order[..i] {
            expose_hidden(g, var, earlier)?;
            substitute_leading(g, var, earlier);
        }
        expose_hidden(g, var, var)?;
        eliminate_immediate(g, var)?;
    }
    Ok(())
}

/// Substitutes away the leading variable of every `var` production that
/// keeps `target` behind a non-empty prefix of nullable variables, so
/// that hidden occurrences (`var → A target γ` with `A ⇒* ε`) become
/// literal leading ones. Productions already leading with `var` itself
/// are left for the immediate-recursion rewrite.
///
/// Each substitution replaces one derivation step and so preserves the
/// language; the NULL set computed on entry therefore stays valid
/// throughout.
fn expose_hidden<A: Alphabet>(g: &mut Grammar<A>, var: Variable, target: Variable) -> Result<()> {
    let null = compute_null_set(g);
    let mut budget = MAX_PREFIX_EXPANSIONS;

    loop {
        let rhs = Capture::<SymbolString>::new();
        let prod = Capture::<ProductionId>::new();
        let pat = Pattern::lhs(var).capture_string(&rhs).bind_production(&prod);

        let mut offender = None;
        let mut matcher = g.search(&pat);
        while matcher.match_next(g) {
            let symbols = rhs.get();
            if hides_behind_nullable_prefix(&symbols, target, &null)
                && symbols.at(0) != Symbol::from(var)
            {
                offender = Some((prod.get(), symbols));
                break;
            }
        }
        let Some((p, symbols)) = offender else { return Ok(()) };

        if budget == 0 {
            return Err(GrammarError::UnproductiveGrammar {
                variable: g.get_name(var).to_string(),
            });
        }
        budget -= 1;

        let head = symbols
            .at(0)
            .as_variable()
            .expect("nullable prefix starts with a variable");
        let tail = symbols.slice(1, symbols.len());

        let delta = Capture::<SymbolString>::new();
        let dpat = Pattern::lhs(head).capture_string(&delta);
        let mut deltas = Vec::new();
        let mut dgen = g.search(&dpat);
        while dgen.match_next(g) {
            deltas.push(delta.get());
        }

        debug!(
            variable = %g.variable_label(var),
            prefix = %g.variable_label(head),
            through = deltas.len(),
            "substituting nullable prefix"
        );

        g.remove_production(p);
        for d in &deltas {
            g.add_production(var, d.clone() + tail.clone());
        }
    }
}

/// Does `target` first occur in `rhs` strictly after a non-empty prefix
/// made only of nullable variables?
fn hides_behind_nullable_prefix(rhs: &SymbolString, target: Variable, null: &NullSet) -> bool {
    let target = Symbol::from(target);
    for (k, sym) in rhs.iter().enumerate() {
        if sym == target {
            return k > 0;
        }
        match sym.as_variable() {
            Some(v) if null.is_nullable(v) => {}
            _ => return false,
        }
    }
    false
}

/// Replaces every `var → earlier γ` by `var → δ γ` for each current
/// production `earlier → δ`.
fn substitute_leading<A: Alphabet>(g: &mut Grammar<A>, var: Variable, earlier: Variable) {
    let gamma = Capture::<SymbolString>::new();
    let prod = Capture::<ProductionId>::new();
    let pat = Pattern::lhs(var)
        .sym(earlier)
        .capture_string(&gamma)
        .bind_production(&prod);

    let mut leading: Vec<(ProductionId, SymbolString)> = Vec::new();
    let mut matcher = g.search(&pat);
    while matcher.match_next(g) {
        leading.push((prod.get(), gamma.get()));
    }
    if leading.is_empty() {
        return;
    }

    let delta = Capture::<SymbolString>::new();
    let dpat = Pattern::lhs(earlier).capture_string(&delta);
    let mut deltas = Vec::new();
    let mut dgen = g.search(&dpat);
    while dgen.match_next(g) {
        deltas.push(delta.get());
    }

    debug!(
        expanded = leading.len(),
        through = deltas.len(),
        "substituting leading variable"
    );

    for (p, gamma) in leading {
        g.remove_production(p);
        for d in &deltas {
            g.add_production(var, d.clone() + gamma.clone());
        }
    }
}

/// Eliminates `var → var α` productions by rewriting
/// `var → β₁ | … | βₖ | var α₁ | … | var αₘ` into
/// `var → β₁ T | … | βₖ T` and `T → α₁ T | … | αₘ T | ε` for a fresh
/// tail variable `T`.
fn eliminate_immediate<A: Alphabet>(g: &mut Grammar<A>, var: Variable) -> Result<()> {
    let alpha = Capture::<SymbolString>::new();
    let prod = Capture::<ProductionId>::new();

    let lr_pat = Pattern::lhs(var)
        .sym(var)
        .capture_string(&alpha)
        .bind_production(&prod);
    let mut recursive: Vec<(ProductionId, SymbolString)> = Vec::new();
    let mut matcher = g.search(&lr_pat);
    while matcher.match_next(g) {
        recursive.push((prod.get(), alpha.get()));
    }
    if recursive.is_empty() {
        return Ok(());
    }

    let rest = Capture::<SymbolString>::new();
    let all_pat = Pattern::lhs(var).capture_string(&rest).bind_production(&prod);
    let mut bases: Vec<(ProductionId, SymbolString)> = Vec::new();
    let mut agen = g.search(&all_pat);
    while agen.match_next(g) {
        let p = prod.get();
        if !recursive.iter().any(|&(q, _)| q == p) {
            bases.push((p, rest.get()));
        }
    }

    // `var → var` derives nothing new; such loops are dropped outright.
    let tails: Vec<SymbolString> = recursive
        .iter()
        .filter(|(_, a)| !a.is_empty())
        .map(|(_, a)| a.clone())
        .collect();
    if tails.is_empty() {
        for (p, _) in recursive {
            g.remove_production(p);
        }
        return Ok(());
    }

    if bases.is_empty() {
        return Err(GrammarError::UnproductiveGrammar {
            variable: g.get_name(var).to_string(),
        });
    }

    let tail_var = g.add_variable();
    g.get_name(tail_var);
    debug!(
        variable = %g.variable_label(var),
        tail = %g.variable_label(tail_var),
        recursive = recursive.len(),
        bases = bases.len(),
        "eliminating immediate left recursion"
    );

    for (p, _) in &recursive {
        g.remove_production(*p);
    }
    for (p, _) in &bases {
        g.remove_production(*p);
    }
    for (_, beta) in &bases {
        g.add_production(var, beta.clone() + tail_var);
    }
    for alpha in &tails {
        g.add_production(tail_var, alpha.clone() + tail_var);
    }
    g.add_production(tail_var, g.epsilon().clone());
    Ok(())
}
