//! `sysdelta init-env` command.

use std::path::Path;

use super::Outcome;
use crate::config::create_default_env_file;
use crate::error::Result;

/// Execute the `init-env` command. An existing file is left untouched.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn run(path: &Path) -> Result<Outcome> {
    if create_default_env_file(path)? {
        println!("Wrote {}", path.display());
    } else {
        println!("{} already exists; not overwritten", path.display());
    }
    Ok(Outcome::Clean)
}
