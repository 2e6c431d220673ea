//! Command dispatch and handlers.

pub mod compare;
pub mod init_env;
pub mod list;
pub mod sections;

use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::adapters::live::http_source::{HttpConfig, HttpSnapshotSource, RetryPolicy};
use crate::adapters::live::local_source::LocalSnapshotSource;
use crate::adapters::replaying::ReplayingSource;
use crate::cli::{Cli, Command};
use crate::config::{self, Settings};
use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::logging::{self, Profile};
use crate::ports::SnapshotSource;

/// Variable naming the cassette file the right-hand source is recorded to.
pub const RECORD_ENV: &str = "SYSDELTA_RECORD";

/// How a finished command wants the process to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report.
    Clean,
    /// Differences were found and the caller asked to fail on them.
    IssuesFound,
}

/// Where a snapshot collection lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A local directory of snapshot directories.
    Local(PathBuf),
    /// The remote snapshot API.
    Http(String),
    /// A recorded cassette.
    Cassette(PathBuf),
}

impl SourceLocation {
    /// Parses a source descriptor: `http://` or `https://` URLs, then
    /// `cassette:<path>`, else a directory path.
    #[must_use]
    pub fn parse(descriptor: &str) -> Self {
        let lower = descriptor.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Http(descriptor.to_string())
        } else if let Some(path) = descriptor.strip_prefix("cassette:") {
            Self::Cassette(PathBuf::from(path))
        } else {
            Self::Local(PathBuf::from(descriptor))
        }
    }
}

/// Opens the source a descriptor names.
///
/// # Errors
///
/// Returns [`Error::InvalidSetting`] for an unusable URL or cassette.
pub fn open_source(
    ctx: &ServiceContext,
    descriptor: &str,
    settings: &Settings,
) -> Result<Box<dyn SnapshotSource>> {
    let source: Box<dyn SnapshotSource> = match SourceLocation::parse(descriptor) {
        SourceLocation::Local(root) => Box::new(LocalSnapshotSource::new(root, ctx.fs.clone())),
        SourceLocation::Http(base_url) => Box::new(HttpSnapshotSource::new(HttpConfig {
            base_url,
            timeout: settings.request_timeout,
            token: settings.api_token.clone(),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                initial_backoff: settings.retry_backoff,
                ..RetryPolicy::default()
            },
        })?),
        SourceLocation::Cassette(path) => {
            Box::new(ReplayingSource::from_file(&path).map_err(|e| Error::setting("cassette", e))?)
        }
    };
    Ok(source)
}

/// Dispatch a parsed command line to its handler.
///
/// Settings are layered from the `.env` file and the environment before
/// logging starts. When `SYSDELTA_RECORD` names a file, the right-hand
/// source's interactions are recorded there.
///
/// # Errors
///
/// Returns the first error that stops the command.
pub fn dispatch(cli: &Cli) -> Result<Outcome> {
    config::load_env_file(cli.env_file.as_deref())?;
    let settings = Settings::from_env()?;
    logging::init(Profile::for_format(settings.log_format, cli.verbose));

    let ctx = match env::var(RECORD_ENV) {
        Ok(path) if !path.trim().is_empty() => ServiceContext::recording(Path::new(&path)),
        _ => ServiceContext::live(),
    };

    let result = dispatch_with_context(&cli.command, &ctx, settings);

    // Finish recording after the command completes, even on error.
    if let Some(path) = ctx.finish_recording()? {
        eprintln!("Recording saved to: {}", path.display());
    }
    result
}

/// Dispatch a command with the given service context.
///
/// # Errors
///
/// Returns the first error that stops the command.
pub fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    settings: Settings,
) -> Result<Outcome> {
    match command {
        Command::Compare(args) => block_on(compare::run(ctx, settings, args)),
        Command::Sections(args) => sections::run(ctx, &settings, args),
        Command::List { source } => block_on(list::run(ctx, &settings, source)),
        Command::InitEnv { path } => init_env::run(path),
    }
}

fn block_on<F: std::future::Future<Output = Result<Outcome>>>(future: F) -> Result<Outcome> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::io("starting async runtime", e))?;
    runtime.block_on(future)
}

/// Writes `value` as pretty JSON to `output`, or to stdout when `None`.
///
/// # Errors
///
/// Returns [`Error::Serialize`] or [`Error::Io`].
pub fn write_json<T: Serialize>(ctx: &ServiceContext, output: Option<&Path>, value: &T) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    match output {
        Some(path) => {
            ctx.fs
                .write(path, &body)
                .map_err(|e| Error::io(format!("writing {}", path.display()), std::io::Error::other(e)))?;
            tracing::info!(path = %path.display(), "wrote report");
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&body).map_err(|e| Error::io("writing report to stdout", e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_pick_their_source() {
        assert_eq!(
            SourceLocation::parse("https://snapshots.example.net/api/"),
            SourceLocation::Http("https://snapshots.example.net/api/".into())
        );
        assert_eq!(SourceLocation::parse("HTTP://host/"), SourceLocation::Http("HTTP://host/".into()));
        assert_eq!(SourceLocation::parse("cassette:runs/a.yaml"), SourceLocation::Cassette("runs/a.yaml".into()));
        assert_eq!(SourceLocation::parse("./snapshots"), SourceLocation::Local("./snapshots".into()));
    }

    #[test]
    fn missing_cassette_is_a_setting_error() {
        let ctx = ServiceContext::live();
        let result = open_source(&ctx, "cassette:/definitely/not/here.yaml", &Settings::default());
        assert!(matches!(result, Err(Error::InvalidSetting { name: "cassette", .. })));
    }
}
