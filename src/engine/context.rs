//! Run context and check results.
//!
//! A [`RunContext`] is created at run start with immutable configuration and
//! only grows by appending [`CheckResult`]s in execution order. Freezing it
//! yields a [`CompletedRun`], which exposes no mutation at all.

use crate::checks::Observed;
use crate::config::ValidationConfig;
use crate::engine::registry::CheckDefinition;
use crate::{CheckCategory, Mode, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Final status of one check in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Warned,
    Failed,
    Errored,
    Skipped,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Warned => "warned",
            CheckStatus::Failed => "failed",
            CheckStatus::Errored => "errored",
            CheckStatus::Skipped => "skipped",
        }
    }

    /// Failed or Errored.
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckStatus::Failed | CheckStatus::Errored)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a check was not executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    DependencyUnmet { dependency: String },
    RunAborted,
    RunCancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DependencyUnmet { dependency } => {
                write!(f, "dependency unmet: {}", dependency)
            }
            SkipReason::RunAborted => f.write_str("run aborted"),
            SkipReason::RunCancelled => f.write_str("run cancelled"),
        }
    }
}

/// Outcome of one check within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub name: String,
    pub category: CheckCategory,
    pub severity: Severity,
    pub status: CheckStatus,
    /// Evaluate attempts made; zero for checks never evaluated
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub observed: BTreeMap<String, Observed>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CheckResult {
    /// Result for a check that ran, taking identity and severity from its
    /// definition.
    pub fn executed(
        def: &CheckDefinition,
        status: CheckStatus,
        attempts: u32,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        CheckResult {
            check_id: def.id.clone(),
            name: def.name.clone(),
            category: def.category,
            severity: def.severity,
            status,
            attempts,
            observed: BTreeMap::new(),
            message: message.into(),
            skip_reason: None,
            started_at,
            finished_at,
        }
    }

    pub fn skipped(def: &CheckDefinition, reason: SkipReason, at: DateTime<Utc>) -> Self {
        CheckResult {
            check_id: def.id.clone(),
            name: def.name.clone(),
            category: def.category,
            severity: def.severity,
            status: CheckStatus::Skipped,
            attempts: 0,
            observed: BTreeMap::new(),
            message: reason.to_string(),
            skip_reason: Some(reason),
            started_at: at,
            finished_at: at,
        }
    }

    pub fn with_observed(mut self, observed: BTreeMap<String, Observed>) -> Self {
        self.observed = observed;
        self
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// The cluster a run targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub name: String,
    pub endpoint: String,
}

impl ClusterIdentity {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        ClusterIdentity {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// How a run stopped short of executing every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunInterruption {
    Aborted { reason: String },
    Cancelled,
}

/// Mutable record of one run in progress.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    cluster: ClusterIdentity,
    mode: Mode,
    config: Arc<ValidationConfig>,
    started_at: DateTime<Utc>,
    results: Vec<CheckResult>,
    interruption: Option<RunInterruption>,
}

impl RunContext {
    pub fn new(cluster: ClusterIdentity, mode: Mode, config: Arc<ValidationConfig>) -> Self {
        RunContext {
            run_id: Uuid::new_v4(),
            cluster,
            mode,
            config,
            started_at: Utc::now(),
            results: Vec::new(),
            interruption: None,
        }
    }

    /// Append a result. A second result for the same check is refused and
    /// `false` returned.
    pub fn record(&mut self, result: CheckResult) -> bool {
        if self.result(&result.check_id).is_some() {
            return false;
        }
        self.results.push(result);
        true
    }

    /// Mark the run aborted. The first interruption wins.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.interruption.is_none() {
            self.interruption = Some(RunInterruption::Aborted {
                reason: reason.into(),
            });
        }
    }

    pub fn cancel(&mut self) {
        if self.interruption.is_none() {
            self.interruption = Some(RunInterruption::Cancelled);
        }
    }

    pub fn result(&self, check_id: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.check_id == check_id)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cluster(&self) -> &ClusterIdentity {
        &self.cluster
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &Arc<ValidationConfig> {
        &self.config
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn interruption(&self) -> Option<&RunInterruption> {
        self.interruption.as_ref()
    }

    /// Stop accepting results.
    pub fn freeze(self, finished_at: DateTime<Utc>) -> CompletedRun {
        CompletedRun {
            run_id: self.run_id,
            cluster: self.cluster,
            mode: self.mode,
            config: self.config,
            started_at: self.started_at,
            finished_at,
            results: self.results,
            interruption: self.interruption,
        }
    }
}

/// A frozen run, ready for aggregation.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    run_id: Uuid,
    cluster: ClusterIdentity,
    mode: Mode,
    config: Arc<ValidationConfig>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    results: Vec<CheckResult>,
    interruption: Option<RunInterruption>,
}

impl CompletedRun {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cluster(&self) -> &ClusterIdentity {
        &self.cluster
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn interruption(&self) -> Option<&RunInterruption> {
        self.interruption.as_ref()
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match &self.interruption {
            Some(RunInterruption::Aborted { reason }) => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn cancelled(&self) -> bool {
        matches!(self.interruption, Some(RunInterruption::Cancelled))
    }
}
