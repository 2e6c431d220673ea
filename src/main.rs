//! Binary entrypoint for the `sysdelta` CLI.

use std::process::ExitCode;

use sysdelta::Outcome;

fn main() -> ExitCode {
    // Recording is handled in commands::dispatch via SYSDELTA_RECORD=<file>.
    match sysdelta::run(std::env::args()) {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::IssuesFound) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}
