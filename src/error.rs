//! Error types for the CFG toolkit.

use thiserror::Error;

/// Errors that can occur while reading or transforming grammars.
///
/// Programmer errors (stale production handles, names violating the
/// `$`-digits rule, asking for a start variable that was never set) are
/// not represented here; those panic at the offending call site.
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("Invalid grammar format: {0}")]
    InvalidFormat(String),

    #[error("Invalid production format: {0}")]
    InvalidProduction(String),

    #[error("Empty grammar input")]
    EmptyInput,

    #[error("Variable {variable} has no non-left-recursive production")]
    UnproductiveGrammar { variable: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, GrammarError>;
