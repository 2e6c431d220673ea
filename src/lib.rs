//! Core library entry for the `sysdelta` CLI.
//!
//! `sysdelta` compares captures of a machine's configuration. Two
//! snapshot collections are reconciled file by file ([`reconcile`]), and
//! two individual snapshots can be compared section by section with
//! record-aware comparators ([`sections`]).

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod ports;
pub mod reconcile;
pub mod report;
pub mod sections;
pub mod snapshot;

use clap::Parser;

pub use commands::Outcome;

/// Run the CLI with the provided arguments.
///
/// Help and version requests print their text and count as a clean run.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<Outcome, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            print!("{err}");
            return Ok(Outcome::Clean);
        }
        Err(err) => return Err(err.to_string()),
    };
    commands::dispatch(&cli).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{run, Outcome};

    #[test]
    fn run_prints_help() {
        assert_eq!(run(["sysdelta", "--help"]), Ok(Outcome::Clean));
    }

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["sysdelta", "unknown"]);
        assert!(result.is_err());
    }
}
