//! `sysdelta compare` command.

use tokio::time::Instant;

use super::{open_source, write_json, Outcome};
use crate::adapters::live::fs_sink::FsDiffSink;
use crate::adapters::memory::NoopSink;
use crate::cli::CompareArgs;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::diff::DiffOptions;
use crate::error::{Error, Result};
use crate::ports::DiffSink;
use crate::reconcile::{collect_collection, reconcile, FileFilter, ReconcileOptions, RunLimits};
use crate::report::{build_report, format_summary};

/// Applies command-line overrides on top of the resolved settings.
fn apply_flags(mut settings: Settings, args: &CompareArgs) -> Settings {
    if let Some(concurrency) = args.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(max_depth) = args.max_depth {
        settings.max_depth = max_depth;
    }
    if args.float_tolerance.is_some() {
        settings.float_tolerance = args.float_tolerance;
    }
    settings
}

/// Execute the `compare` command.
///
/// Collects both sides, reconciles them, writes the JSON report and prints
/// the summary to stderr.
///
/// # Errors
///
/// Returns an error for unusable settings or source descriptors. A side
/// that cannot list its snapshots is reported in the result instead.
pub async fn run(ctx: &ServiceContext, settings: Settings, args: &CompareArgs) -> Result<Outcome> {
    let settings = apply_flags(settings, args);
    settings.validate()?;
    for (side, descriptor) in [("left", &args.left), ("right", &args.right)] {
        if descriptor.trim().is_empty() {
            return Err(Error::NoSources(side));
        }
    }

    let left = open_source(ctx, &args.left, &settings)?;
    let right = ctx.record(open_source(ctx, &args.right, &settings)?);

    let deadline = settings.run_budget.map(|budget| Instant::now() + budget);
    let filter = FileFilter::sections(args.only.clone());
    let limits = RunLimits::new(settings.concurrency, deadline);

    let (left, right) = tokio::try_join!(
        collect_collection(left.as_ref(), &filter, &limits),
        collect_collection(right.as_ref(), &filter, &limits),
    )?;

    let sink: Box<dyn DiffSink> = match &args.diff_dir {
        Some(dir) => Box::new(FsDiffSink::new(dir, ctx.fs.clone())),
        None => Box::new(NoopSink),
    };
    let options = ReconcileOptions {
        concurrency: settings.concurrency,
        diff: DiffOptions { max_depth: settings.max_depth, float_tolerance: settings.float_tolerance },
        deadline,
    };
    let result = reconcile(&left, &right, sink.as_ref(), &options).await?;
    let report = build_report(result, ctx.clock.now());

    write_json(ctx, args.output.as_deref(), &report)?;
    eprint!("{}", format_summary(&report.summary));

    if args.fail_on_diff && report.summary.has_issues() {
        Ok(Outcome::IssuesFound)
    } else {
        Ok(Outcome::Clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> CompareArgs {
        let mut argv = vec!["sysdelta", "compare"];
        argv.extend_from_slice(extra);
        match crate::cli::Cli::parse_from(argv).command {
            crate::cli::Command::Compare(args) => args,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn context() -> ServiceContext {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        ServiceContext::with_ports(Arc::new(FixedClock(at)), Arc::new(LiveFileSystem))
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn flags_override_settings() {
        let settings = apply_flags(
            Settings::default(),
            &args(&["--left", "a", "--right", "b", "--concurrency", "2", "--float-tolerance", "0.5"]),
        );
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.float_tolerance, Some(0.5));
        assert_eq!(settings.max_depth, Settings::default().max_depth);
    }

    #[tokio::test]
    async fn writes_report_and_diff_artifacts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "left/S1/Path.json", r#"[{"Path": "C:\\Windows"}]"#);
        write(root, "right/S1/Path.json", r#"[{"Path": "C:\\Tools"}]"#);
        write(root, "left/S1/Same.json", r#"{"a": 1}"#);
        write(root, "right/S1/Same.json", r#"{"a": 1.0}"#);
        let output = root.join("report.json");
        let diffs = root.join("diffs");

        let left = root.join("left");
        let right = root.join("right");
        let args = args(&[
            "--left",
            left.to_str().unwrap(),
            "--right",
            right.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--diff-dir",
            diffs.to_str().unwrap(),
            "--fail-on-diff",
        ]);
        let outcome = run(&context(), Settings::default(), &args).await.unwrap();
        assert_eq!(outcome, Outcome::IssuesFound);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report["generated_at"], "2024-05-01T00:00:00Z");
        assert_eq!(report["summary"]["files_with_content_differences"], 1);
        assert!(diffs.join("S1").join("Path.json.diff.json").is_file());
        assert!(!diffs.join("S1").join("Same.json.diff.json").exists());
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected_before_any_fetch() {
        let args = args(&["--left", "a", "--right", "b", "--concurrency", "0"]);
        let err = run(&context(), Settings::default(), &args).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConcurrency(0)));
    }

    #[tokio::test]
    async fn blank_descriptor_names_the_side() {
        let args = args(&["--left", "a", "--right", " "]);
        let err = run(&context(), Settings::default(), &args).await.unwrap_err();
        assert!(matches!(err, Error::NoSources("right")));
    }

    #[tokio::test]
    async fn unreadable_side_is_reported_as_a_failure() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "left/S1/Path.json", "[]");
        let left = root.join("left");
        let missing = root.join("nowhere");
        let output = root.join("report.json");
        let args = args(&[
            "--left",
            left.to_str().unwrap(),
            "--right",
            missing.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--fail-on-diff",
        ]);
        let outcome = run(&context(), Settings::default(), &args).await.unwrap();
        assert_eq!(outcome, Outcome::IssuesFound);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report["summary"]["failure_count"], 1);
        assert_eq!(report["summary"]["missing_in_right"], 1);
        assert_eq!(report["details"]["listing_failures"][0]["side"], "right");
    }
}
