//! Context-Free Grammar Toolkit
//!
//! Command-line front end over the library: Earley parsing,
//! left-recursion removal and LL(1) table construction for grammars
//! read from a simple line-oriented text format.

use std::process;

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cfg_toolkit::cli::run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
