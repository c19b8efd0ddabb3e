//! Relay CLI
//!
//! Runs command lines and functions from a function pack.

use relay_core::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
