//! Entry point for the `replwatch` binary.
//!
//! Delegates to [`replwatch::run`], which parses flags, then either prints
//! the replica set status once, initiates the replica set, or serves status
//! over HTTP until interrupted.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    replwatch::run(std::env::args_os(), &mut stdout, &mut stderr)
}
