//! `sysdelta list` command.

use super::{open_source, Outcome};
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::ports::SnapshotSource;

/// Snapshot ids of `source`, sorted, one per line.
///
/// # Errors
///
/// Returns [`Error::Source`] if the ids cannot be listed.
pub async fn render(source: &dyn SnapshotSource) -> Result<String> {
    let mut ids = source
        .list_snapshot_ids()
        .await
        .map_err(|error| Error::Source { source_name: source.describe(), error })?;
    ids.sort();
    ids.dedup();
    let mut out = String::new();
    for id in ids {
        out.push_str(&id);
        out.push('\n');
    }
    Ok(out)
}

/// Execute the `list` command.
///
/// # Errors
///
/// Returns an error if the source cannot be opened or listed.
pub async fn run(ctx: &ServiceContext, settings: &Settings, descriptor: &str) -> Result<Outcome> {
    let source = ctx.record(open_source(ctx, descriptor, settings)?);
    print!("{}", render(source.as_ref()).await?);
    Ok(Outcome::Clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySource;
    use crate::ports::{FetchError, FetchErrorKind};

    #[tokio::test]
    async fn lists_ids_in_order() {
        let source = InMemorySource::new("mem")
            .with_file("S2", "a.json", b"{}")
            .with_file("S1", "a.json", b"{}");
        assert_eq!(render(&source).await.unwrap(), "S1\nS2\n");
    }

    #[tokio::test]
    async fn listing_failure_names_the_source() {
        let source = InMemorySource::new("mem")
            .with_id_listing_error(FetchError::new(FetchErrorKind::Transport, "refused"));
        let err = render(&source).await.unwrap_err();
        assert!(matches!(err, Error::Source { ref source_name, .. } if source_name == "mem"));
    }
}
