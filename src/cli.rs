//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI parser for `sysdelta`.
#[derive(Debug, Parser)]
#[command(name = "sysdelta", version, about = "Compare system configuration snapshots")]
pub struct Cli {
    /// Load settings from this `.env` file instead of the default locations.
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile two snapshot collections file by file.
    Compare(CompareArgs),
    /// Compare two snapshot directories section by section.
    Sections(SectionsArgs),
    /// List the snapshots a source holds.
    List {
        /// Directory, `http(s)://` URL or `cassette:<path>`.
        #[arg(long)]
        source: String,
    },
    /// Write a default `.env` file.
    InitEnv {
        /// Where to write it.
        #[arg(long, default_value = ".env")]
        path: PathBuf,
    },
}

/// Arguments for `compare`.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Left collection: directory, `http(s)://` URL or `cassette:<path>`.
    #[arg(long)]
    pub left: String,

    /// Right collection, same forms as `--left`.
    #[arg(long)]
    pub right: String,

    /// Only compare these sections (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Write the JSON report here instead of stdout.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Store one diff artifact per differing file under this directory.
    #[arg(long, value_name = "DIR")]
    pub diff_dir: Option<PathBuf>,

    /// Bound on concurrent fetches and comparisons.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Structural diff recursion limit.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Absolute tolerance for numeric comparison.
    #[arg(long)]
    pub float_tolerance: Option<f64>,

    /// Exit with status 1 when the collections differ.
    #[arg(long)]
    pub fail_on_diff: bool,
}

/// Arguments for `sections`.
#[derive(Debug, Args)]
pub struct SectionsArgs {
    /// Baseline snapshot directory.
    #[arg(long)]
    pub baseline: PathBuf,

    /// Current snapshot directory.
    #[arg(long)]
    pub current: PathBuf,

    /// Only compare these sections (comma separated); `All` means every one.
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Write the JSON comparison here instead of stdout.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
