//! Command line front end: argument parsing, target resolution, the check
//! listing and exit-code mapping.

pub mod args;

use crate::cluster::snapshot::SnapshotReader;
use crate::config::ValidationConfig;
use crate::engine::registry::CheckRegistry;
use crate::engine::result::Verdict;
use crate::session::{ClusterTarget, RunOutcome};
use crate::{CheckCategory, ConfigError, Mode, PreflightError};
use args::CheckArgs;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// Every run passed or only warned.
pub const EXIT_OK: u8 = 0;
/// At least one run's verdict is FAIL.
pub const EXIT_FAIL: u8 = 1;
/// Configuration or runtime error; no trustworthy verdict.
pub const EXIT_ERROR: u8 = 3;
/// Verdicts computed but a report could not be written.
pub const EXIT_IO: u8 = 4;

/// Resolve the clusters to validate: `--snapshot` names a single cluster,
/// otherwise the configuration's cluster list is used.
pub fn build_targets(
    args: &CheckArgs,
    config: &ValidationConfig,
) -> Result<Vec<ClusterTarget>, PreflightError> {
    if let Some(path) = &args.snapshot {
        let reader = SnapshotReader::from_path(path)?;
        let name = args
            .cluster
            .clone()
            .unwrap_or_else(|| cluster_name_from_path(path));
        let endpoint = args
            .endpoint
            .clone()
            .or_else(|| reader.endpoint().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        return Ok(vec![ClusterTarget::new(name, endpoint, Arc::new(reader))]);
    }

    if config.clusters.is_empty() {
        return Err(ConfigError::NoTargets.into());
    }

    config
        .clusters
        .iter()
        .filter(|entry| args.cluster.as_ref().map_or(true, |c| *c == entry.name))
        .map(|entry| {
            let reader = SnapshotReader::from_path(&entry.snapshot)?;
            let endpoint = entry
                .endpoint
                .clone()
                .or_else(|| reader.endpoint().map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string());
            Ok(ClusterTarget::new(
                entry.name.clone(),
                endpoint,
                Arc::new(reader),
            ))
        })
        .collect::<Result<Vec<_>, PreflightError>>()
        .and_then(|targets| {
            if targets.is_empty() {
                Err(ConfigError::NoTargets.into())
            } else {
                Ok(targets)
            }
        })
}

fn cluster_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("cluster")
        .to_string()
}

/// Text for the `list` command: the checks a run of `mode` would execute,
/// in execution order, grouped by category.
pub fn format_check_list(registry: &CheckRegistry, mode: Mode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}-upgrade checks:", mode);

    for category in CheckCategory::ALL {
        let defs: Vec<_> = registry
            .definitions(mode)
            .iter()
            .filter(|d| d.category == category)
            .collect();
        if defs.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", category.title());
        for def in defs {
            let _ = write!(
                out,
                "  {:<26} {:<9} {}",
                def.id,
                def.severity.as_str(),
                def.name
            );
            if !def.depends_on.is_empty() {
                let _ = write!(out, " (after {})", def.depends_on.join(", "));
            }
            let _ = writeln!(out);
        }
    }

    if registry.definitions(mode).is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  (no checks selected)");
    }
    out
}

/// Exit status for an invocation. A FAIL verdict outranks setup errors,
/// which outrank storage errors.
pub fn exit_code(outcomes: &[RunOutcome], task_failed: bool) -> u8 {
    if outcomes.iter().any(|o| o.report.verdict == Verdict::Fail) {
        EXIT_FAIL
    } else if task_failed {
        EXIT_ERROR
    } else if outcomes.iter().any(RunOutcome::storage_failed) {
        EXIT_IO
    } else {
        EXIT_OK
    }
}
