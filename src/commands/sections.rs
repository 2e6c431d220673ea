//! `sysdelta sections` command.

use super::{write_json, Outcome};
use crate::cli::SectionsArgs;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::diff::DiffOptions;
use crate::error::Result;
use crate::sections::{compare_snapshots, format_comparison, ComparatorRegistry};
use crate::snapshot::loader::load_snapshot_dir;

/// Execute the `sections` command.
///
/// # Errors
///
/// Returns an error when either snapshot directory cannot be loaded or the
/// output cannot be written.
pub fn run(ctx: &ServiceContext, settings: &Settings, args: &SectionsArgs) -> Result<Outcome> {
    settings.validate()?;
    let baseline = load_snapshot_dir(ctx.fs.as_ref(), &args.baseline, &args.only)?;
    let current = load_snapshot_dir(ctx.fs.as_ref(), &args.current, &args.only)?;

    let registry = ComparatorRegistry::with_defaults();
    let options = DiffOptions { max_depth: settings.max_depth, float_tolerance: settings.float_tolerance };
    let comparison = compare_snapshots(&registry, &baseline, &current, &options);
    tracing::info!(
        baseline = %baseline.id,
        current = %current.id,
        changed = comparison.changed_sections().len(),
        "compared snapshots"
    );

    write_json(ctx, args.output.as_deref(), &comparison)?;
    eprint!("{}", format_comparison(&comparison));
    Ok(Outcome::Clean)
}
