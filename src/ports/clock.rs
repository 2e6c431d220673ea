//! Clock port for stamping reports.

use chrono::{DateTime, Utc};

/// Provides the current time.
///
/// Reports carry a generation timestamp; tests substitute a fixed clock so
/// the rendered documents are reproducible.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
