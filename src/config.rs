//! Runtime settings.
//!
//! Resolution order, later layers winning: built-in defaults, a `.env`
//! file, the process environment, then command-line flags (applied by the
//! command layer). A `.env` file never overrides variables already set in
//! the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::reconcile::DEFAULT_CONCURRENCY;

const CONCURRENCY: &str = "SYSDELTA_CONCURRENCY";
const REQUEST_TIMEOUT_SECS: &str = "SYSDELTA_REQUEST_TIMEOUT_SECS";
const MAX_RETRIES: &str = "SYSDELTA_MAX_RETRIES";
const RETRY_BACKOFF_MS: &str = "SYSDELTA_RETRY_BACKOFF_MS";
const MAX_DEPTH: &str = "SYSDELTA_MAX_DEPTH";
const RUN_BUDGET_SECS: &str = "SYSDELTA_RUN_BUDGET_SECS";
const FLOAT_TOLERANCE: &str = "SYSDELTA_FLOAT_TOLERANCE";
const API_TOKEN: &str = "SYSDELTA_API_TOKEN";
const LOG_FORMAT: &str = "SYSDELTA_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Bound on concurrent fetches and comparisons.
    pub concurrency: usize,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Retries after a failed HTTP request.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_backoff: Duration,
    /// Structural diff recursion limit.
    pub max_depth: usize,
    /// Wall-clock budget for a whole run.
    pub run_budget: Option<Duration>,
    /// Numeric tolerance for the structural differ.
    pub float_tolerance: Option<f64>,
    /// Bearer token for the remote API.
    pub api_token: Option<String>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            max_depth: crate::diff::DEFAULT_MAX_DEPTH,
            run_budget: None,
            float_tolerance: None,
            api_token: None,
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Settings from defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] for a variable that does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Settings from defaults overlaid with whatever `lookup` returns.
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] for a value that does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();
        if let Some(v) = get(CONCURRENCY) {
            settings.concurrency = parse(CONCURRENCY, &v)?;
        }
        if let Some(v) = get(REQUEST_TIMEOUT_SECS) {
            settings.request_timeout = Duration::from_secs(parse(REQUEST_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = get(MAX_RETRIES) {
            settings.max_retries = parse(MAX_RETRIES, &v)?;
        }
        if let Some(v) = get(RETRY_BACKOFF_MS) {
            settings.retry_backoff = Duration::from_millis(parse(RETRY_BACKOFF_MS, &v)?);
        }
        if let Some(v) = get(MAX_DEPTH) {
            settings.max_depth = parse(MAX_DEPTH, &v)?;
        }
        if let Some(v) = get(RUN_BUDGET_SECS) {
            settings.run_budget = Some(Duration::from_secs(parse(RUN_BUDGET_SECS, &v)?));
        }
        if let Some(v) = get(FLOAT_TOLERANCE) {
            settings.float_tolerance = Some(parse(FLOAT_TOLERANCE, &v)?);
        }
        settings.api_token = get(API_TOKEN);
        if let Some(v) = get(LOG_FORMAT) {
            settings.log_format = match v.trim().to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(Error::setting(LOG_FORMAT, format!("expected text or json, got {other:?}")))
                }
            };
        }
        Ok(settings)
    }

    /// Rejects values no run can work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConcurrency`] or [`Error::InvalidSetting`].
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency(0));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::setting(REQUEST_TIMEOUT_SECS, "must be greater than zero"));
        }
        if self.max_depth == 0 {
            return Err(Error::setting(MAX_DEPTH, "must be greater than zero"));
        }
        if self.run_budget.is_some_and(|b| b.is_zero()) {
            return Err(Error::setting(RUN_BUDGET_SECS, "must be greater than zero"));
        }
        if let Some(tolerance) = self.float_tolerance {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(Error::setting(FLOAT_TOLERANCE, format!("{tolerance} is not a non-negative number")));
            }
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| Error::setting(name, format!("{value:?}: {e}")))
}

/// Where `.env` files are looked for, in order: an explicit path, the
/// working directory, then `~/.config/sysdelta/.env`.
#[must_use]
pub fn env_file_candidates(explicit: Option<&Path>, cwd: &Path, home: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut candidates = vec![cwd.join(".env")];
    if let Some(home) = home {
        candidates.push(home.join(".config").join("sysdelta").join(".env"));
    }
    candidates
}

/// Loads the first existing `.env` candidate into the process environment.
/// Returns the file that was loaded.
///
/// # Errors
///
/// Returns [`Error::InvalidSetting`] if an explicitly named file is missing
/// or any chosen file does not parse.
pub fn load_env_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().map_err(|e| Error::io("reading working directory", e))?;
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")).map(PathBuf::from);
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::setting("env_file", format!("{} does not exist", path.display())));
        }
    }
    for candidate in env_file_candidates(explicit, &cwd, home.as_deref()) {
        if candidate.is_file() {
            dotenvy::from_path(&candidate)
                .map_err(|e| Error::setting("env_file", format!("{}: {e}", candidate.display())))?;
            tracing::debug!(path = %candidate.display(), "loaded environment file");
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Commented `.env` template listing every setting with its default.
#[must_use]
pub fn default_env_contents() -> String {
    let defaults = Settings::default();
    format!(
        "# sysdelta settings\n\
         # Values set in the real environment take precedence over this file.\n\
         \n\
         # Bound on concurrent fetches and comparisons\n\
         {CONCURRENCY}={}\n\
         \n\
         # Remote API\n\
         {REQUEST_TIMEOUT_SECS}={}\n\
         {MAX_RETRIES}={}\n\
         {RETRY_BACKOFF_MS}={}\n\
         # {API_TOKEN}=\n\
         \n\
         # Comparison\n\
         {MAX_DEPTH}={}\n\
         # {FLOAT_TOLERANCE}=0.001\n\
         # {RUN_BUDGET_SECS}=300\n\
         \n\
         # Logging: text or json\n\
         {LOG_FORMAT}=text\n",
        defaults.concurrency,
        defaults.request_timeout.as_secs(),
        defaults.max_retries,
        defaults.retry_backoff.as_millis(),
        defaults.max_depth,
    )
}

/// Writes the default `.env` template to `path` unless a file is already
/// there. Returns whether a file was written.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn create_default_env_file(path: &Path) -> Result<bool> {
    if path.exists() {
        tracing::info!(path = %path.display(), "environment file already exists, leaving it alone");
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
    }
    std::fs::write(path, default_env_contents())
        .map_err(|e| Error::io(format!("writing {}", path.display()), e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        settings.validate().unwrap();
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("SYSDELTA_CONCURRENCY", "3"),
            ("SYSDELTA_REQUEST_TIMEOUT_SECS", "5"),
            ("SYSDELTA_FLOAT_TOLERANCE", "0.01"),
            ("SYSDELTA_API_TOKEN", "tok"),
            ("SYSDELTA_LOG_FORMAT", "JSON"),
            ("SYSDELTA_RUN_BUDGET_SECS", ""),
        ]))
        .unwrap();
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.float_tolerance, Some(0.01));
        assert_eq!(settings.api_token.as_deref(), Some("tok"));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.run_budget, None);
    }

    #[test]
    fn unparseable_value_names_the_variable() {
        let err = Settings::from_lookup(lookup(&[("SYSDELTA_MAX_DEPTH", "deep")])).unwrap_err();
        assert!(err.to_string().contains("SYSDELTA_MAX_DEPTH"), "{err}");
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let zero = Settings { concurrency: 0, ..Settings::default() };
        assert!(matches!(zero.validate(), Err(Error::InvalidConcurrency(0))));
        let negative = Settings { float_tolerance: Some(-1.0), ..Settings::default() };
        assert!(negative.validate().is_err());
        let shallow = Settings { max_depth: 0, ..Settings::default() };
        assert!(shallow.validate().is_err());
    }

    #[test]
    fn explicit_env_file_is_the_only_candidate() {
        let cwd = Path::new("/work");
        let home = Path::new("/home/u");
        assert_eq!(
            env_file_candidates(None, cwd, Some(home)),
            [PathBuf::from("/work/.env"), PathBuf::from("/home/u/.config/sysdelta/.env")]
        );
        assert_eq!(
            env_file_candidates(Some(Path::new("/x/.env")), cwd, Some(home)),
            [PathBuf::from("/x/.env")]
        );
    }

    #[test]
    fn default_env_file_is_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf/.env");
        assert!(create_default_env_file(&path).unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("SYSDELTA_CONCURRENCY=8"));

        std::fs::write(&path, "CUSTOM=1\n").unwrap();
        assert!(!create_default_env_file(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "CUSTOM=1\n");
    }

    #[test]
    fn template_parses_back_to_defaults() {
        let pairs: Vec<(String, String)> = default_env_contents()
            .lines()
            .filter(|l| !l.starts_with('#') && l.contains('='))
            .filter_map(|l| l.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect();
        let settings = Settings::from_lookup(|name| {
            pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        })
        .unwrap();
        assert_eq!(settings, Settings::default());
    }
}
