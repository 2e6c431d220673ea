//! Logging initialization.
//!
//! Events go to stderr so stdout stays reserved for reports.

use std::sync::Once;

use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Variable consulted for the log filter before `RUST_LOG`.
pub const LOG_ENV: &str = "SYSDELTA_LOG";

/// Logging profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output, debug level.
    Development,
    /// Human-readable output, info level.
    Standard,
    /// JSON structured output, info level.
    Production,
    /// No output; tests install their own subscriber if they need one.
    Test,
}

impl Profile {
    /// Profile for a configured log format, raised to development level
    /// when `verbose` is set.
    #[must_use]
    pub fn for_format(format: LogFormat, verbose: bool) -> Self {
        match (format, verbose) {
            (LogFormat::Json, _) => Self::Production,
            (LogFormat::Text, true) => Self::Development,
            (LogFormat::Text, false) => Self::Standard,
        }
    }

    fn default_directive(self) -> &'static str {
        match self {
            Self::Development => "sysdelta=debug",
            Self::Standard | Self::Production | Self::Test => "sysdelta=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Installs the global subscriber. Only the first call has any effect.
///
/// The filter comes from `SYSDELTA_LOG`, then `RUST_LOG`, then the
/// profile's default.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = filter_for(profile);
        match profile {
            Profile::Development | Profile::Standard => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(filter)
                    .init();
            }
            Profile::Production => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_env_filter(filter)
                    .init();
            }
            Profile::Test => {
                tracing_subscriber::registry().init();
            }
        }
    });
}

fn filter_for(profile: Profile) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(profile.default_directive()))
}
