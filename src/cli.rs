//! CLI for the grammar toolkit.
//!
//! Three subcommands mirror the classic tool split: `parse` runs the
//! Earley recognizer over a token stream, `remove-lr` rewrites the
//! grammar without left recursion, `to-ll1` prints the LL(1) parse
//! table. Grammars are read from a text file (or `--stdin`) with one
//! rule per line:
//!
//! ```text
//! # comments and blank lines are skipped
//! E  -> T E'
//! E' -> + T E' | ε
//! T  -> id
//! ```
//!
//! Tokens are whitespace-separated; a token is a variable iff it
//! appears as some rule's left-hand side, every other token is a
//! terminal over `String`, and a lone `ε` (or `eps`) is the empty
//! alternative. The first left-hand side is the start variable.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::analysis::{compute_first_set, compute_follow_set, compute_null_set};
use crate::earley;
use crate::error::{GrammarError, Result};
use crate::grammar::Grammar;
use crate::ll1::build_ll1_table;
use crate::pattern::{Capture, Pattern};
use crate::remove_lr::remove_left_recursion;
use crate::string::SymbolString;
use crate::symbol::{Symbol, Variable};

#[derive(Parser)]
#[command(name = "cfg-toolkit", version, about = "Context-free grammar toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a token stream with the Earley recognizer.
    Parse {
        /// Grammar file (or use --stdin).
        grammar: Option<PathBuf>,
        /// Read the grammar from standard input.
        #[arg(long)]
        stdin: bool,
        /// Compute FIRST sets and use them to prune predictions.
        #[arg(long)]
        predict: bool,
        /// Output a parse tree, optionally as `dot` or `lisp`.
        #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "plain")]
        tree: Option<TreeFormat>,
        /// Input tokens.
        #[arg(last = true)]
        tokens: Vec<String>,
    },
    /// Rewrite the grammar without direct or indirect left recursion.
    RemoveLr {
        grammar: Option<PathBuf>,
        #[arg(long)]
        stdin: bool,
    },
    /// Build the LL(1) parse table.
    ToLl1 {
        grammar: Option<PathBuf>,
        #[arg(long)]
        stdin: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TreeFormat {
    Plain,
    Dot,
    Lisp,
}

/// Main CLI runner.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse { grammar, stdin, predict, tree, tokens } => {
            let g = read_grammar_source(grammar.as_deref(), stdin)?;
            let null = compute_null_set(&g);
            let first = predict.then(|| compute_first_set(&g, &null));
            let result = earley::parse(&g, &null, first.as_ref(), &tokens, tree.is_some());
            println!("{}", if result.accepted { "yes" } else { "no" });
            if let (Some(format), Some(parse_tree)) = (tree, result.tree) {
                match format {
                    TreeFormat::Plain => print!("{}", parse_tree.to_plain(&g)),
                    TreeFormat::Dot => print!("{}", parse_tree.to_dot(&g)),
                    TreeFormat::Lisp => println!("{}", parse_tree.to_lisp(&g)),
                }
            }
        }
        Command::RemoveLr { grammar, stdin } => {
            let mut g = read_grammar_source(grammar.as_deref(), stdin)?;
            remove_left_recursion(&mut g)?;
            print!("{}", format_grammar(&mut g));
        }
        Command::ToLl1 { grammar, stdin } => {
            let g = read_grammar_source(grammar.as_deref(), stdin)?;
            let null = compute_null_set(&g);
            let first = compute_first_set(&g, &null);
            let follow = compute_follow_set(&g, &null, &first);
            let table = build_ll1_table(&g, &null, &first, &follow);

            let mut entries: Vec<_> = table.entries().collect();
            entries.sort_by_key(|&(v, t, _)| (v, t.index()));
            for (v, t, p) in entries {
                println!(
                    "M[{}, {}] = {}",
                    g.variable_label(v),
                    g.terminal_label(t),
                    g.production_label(p)
                );
            }
            for conflict in table.conflicts() {
                eprintln!(
                    "conflict at M[{}, {}]: kept {} over {}",
                    g.variable_label(conflict.variable),
                    g.terminal_label(conflict.terminal),
                    g.production_label(conflict.kept),
                    g.production_label(conflict.replaced)
                );
            }
        }
    }

    Ok(())
}

fn read_grammar_source(path: Option<&std::path::Path>, stdin: bool) -> Result<Grammar<String>> {
    let text = match (path, stdin) {
        (Some(path), false) => std::fs::read_to_string(path)?,
        (None, true) => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
        _ => {
            return Err(GrammarError::InvalidFormat(
                "expected a grammar file or --stdin".to_string(),
            ));
        }
    };
    parse_grammar(&text)
}

/// Parses the line-oriented grammar format described in the module
/// docs. The first left-hand side becomes the start variable.
pub fn parse_grammar(text: &str) -> Result<Grammar<String>> {
    let rules: Vec<(&str, &str)> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (lhs, rhs) = line
                .split_once("->")
                .ok_or_else(|| GrammarError::InvalidProduction(line.to_string()))?;
            let lhs = lhs.trim();
            if lhs.is_empty() || lhs.split_whitespace().count() != 1 {
                return Err(GrammarError::InvalidProduction(line.to_string()));
            }
            if let Some(digits) = lhs.strip_prefix('$') {
                if !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(GrammarError::InvalidProduction(format!(
                        "bad variable name {lhs:?}: `$` names take digits only"
                    )));
                }
            }
            Ok((lhs, rhs))
        })
        .collect::<Result<_>>()?;

    if rules.is_empty() {
        return Err(GrammarError::EmptyInput);
    }

    let mut g = Grammar::new();
    for (lhs, _) in &rules {
        g.get_variable(lhs);
    }

    for (lhs, rhs) in rules {
        let var = g.get_variable(lhs);
        for alt in rhs.split('|') {
            let tokens: Vec<&str> = alt.split_whitespace().collect();
            if tokens.is_empty() {
                return Err(GrammarError::InvalidProduction(format!(
                    "{lhs}: empty alternative (use ε for the empty string)"
                )));
            }
            if tokens.len() == 1 && is_epsilon_token(tokens[0]) {
                g.add_production(var, g.epsilon().clone());
                continue;
            }
            let mut syms = Vec::with_capacity(tokens.len());
            for token in tokens {
                if is_epsilon_token(token) {
                    return Err(GrammarError::InvalidProduction(format!(
                        "{lhs}: ε must stand alone in an alternative"
                    )));
                }
                match g.variable_named(token) {
                    Some(w) => syms.push(Symbol::from(w)),
                    None => syms.push(g.get_terminal(token.to_string()).into()),
                }
            }
            g.add_production(var, SymbolString::new(&syms));
        }
    }

    Ok(g)
}

fn is_epsilon_token(token: &str) -> bool {
    token == "ε" || token == "eps"
}

/// Renders a grammar back into the line format, one variable per line,
/// alternatives in iteration order. Anonymous variables get their `$k`
/// names materialized first.
pub fn format_grammar(g: &mut Grammar<String>) -> String {
    let vars = {
        let v = Capture::<Variable>::new();
        let mut matcher = g.search_variables(&v);
        let mut vars = Vec::new();
        while matcher.match_next(g) {
            vars.push(v.get());
        }
        vars
    };
    for &v in &vars {
        g.get_name(v);
    }

    let mut out = String::new();
    for &v in &vars {
        let rhs = Capture::<SymbolString>::new();
        let pat = Pattern::lhs(v).capture_string(&rhs);
        let mut matcher = g.search(&pat);
        let mut alts = Vec::new();
        while matcher.match_next(g) {
            alts.push(g.string_label(&rhs.get()));
        }
        out.push_str(&format!("{} -> {}\n", g.variable_label(v), alts.join(" | ")));
    }
    out
}
