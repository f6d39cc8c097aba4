//! Result classification and aggregation.
//!
//! Reduces a [`CompletedRun`] to a [`Report`]. Aggregation is a pure
//! function of the frozen run and its configuration: the report timestamp is
//! the run's finish time, so aggregating the same run twice yields identical
//! reports.

use crate::engine::context::{
    CheckResult, CheckStatus, ClusterIdentity, CompletedRun, RunInterruption, SkipReason,
};
use crate::{Mode, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Overall outcome of a run. Ordered by badness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Warn => "WARN",
            Verdict::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tally of results by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub total: usize,
}

impl StatusCounts {
    fn add(&mut self, status: CheckStatus) {
        self.total += 1;
        match status {
            CheckStatus::Passed => self.passed += 1,
            CheckStatus::Warned => self.warned += 1,
            CheckStatus::Failed => self.failed += 1,
            CheckStatus::Errored => self.errored += 1,
            CheckStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn tally<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> Self {
        let mut counts = StatusCounts::default();
        for result in results {
            counts.add(result.status);
        }
        counts
    }
}

/// Status tallies per severity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: StatusCounts,
    pub warning: StatusCounts,
    pub info: StatusCounts,
}

impl SeverityCounts {
    pub fn tally<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> Self {
        let mut counts = SeverityCounts::default();
        for result in results {
            let tier = match result.severity {
                Severity::Critical => &mut counts.critical,
                Severity::Warning => &mut counts.warning,
                Severity::Info => &mut counts.info,
            };
            tier.add(result.status);
        }
        counts
    }
}

/// Aggregated outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub cluster: ClusterIdentity,
    pub mode: Mode,
    pub verdict: Verdict,
    /// Whether critical failures were configured to fail this mode
    pub fail_on_errors: bool,
    pub counts: StatusCounts,
    pub by_severity: SeverityCounts,
    pub results: Vec<CheckResult>,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl Report {
    pub fn is_aborted(&self) -> bool {
        self.abort_reason.is_some()
    }
}

/// Reduce a frozen run to its report.
pub fn aggregate(run: &CompletedRun) -> Report {
    let fail_on_errors = run.config().fail_on_errors(run.mode());
    let results = run.results().to_vec();

    Report {
        run_id: run.run_id(),
        cluster: run.cluster().clone(),
        mode: run.mode(),
        verdict: compute_verdict(&results, fail_on_errors, run.interruption()),
        fail_on_errors,
        counts: StatusCounts::tally(&results),
        by_severity: SeverityCounts::tally(&results),
        started_at: run.started_at(),
        generated_at: run.finished_at(),
        abort_reason: run.abort_reason().map(str::to_string),
        cancelled: run.cancelled(),
        results,
    }
}

/// Verdict rules:
/// - an aborted run is Fail
/// - a critical Failed/Errored result is Fail when `fail_on_errors`, else Warn
/// - any other Failed/Errored or Warned result is Warn
/// - skips from an abort are Fail, skips from cancellation are Warn, and
///   dependency skips add nothing of their own
pub fn compute_verdict(
    results: &[CheckResult],
    fail_on_errors: bool,
    interruption: Option<&RunInterruption>,
) -> Verdict {
    let mut verdict = match interruption {
        Some(RunInterruption::Aborted { .. }) => Verdict::Fail,
        Some(RunInterruption::Cancelled) => Verdict::Warn,
        None => Verdict::Pass,
    };

    for result in results {
        let contribution = match result.status {
            CheckStatus::Passed => Verdict::Pass,
            CheckStatus::Warned => Verdict::Warn,
            CheckStatus::Failed | CheckStatus::Errored => {
                if result.severity == Severity::Critical && fail_on_errors {
                    Verdict::Fail
                } else {
                    Verdict::Warn
                }
            }
            CheckStatus::Skipped => match result.skip_reason {
                Some(SkipReason::RunAborted) => Verdict::Fail,
                Some(SkipReason::RunCancelled) => Verdict::Warn,
                Some(SkipReason::DependencyUnmet { .. }) | None => Verdict::Pass,
            },
        };
        verdict = verdict.max(contribution);
    }

    verdict
}
