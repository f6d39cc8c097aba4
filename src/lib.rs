//! upgrade-preflight library
//!
//! Health validation for managed clusters before and after a disruptive
//! upgrade. A run evaluates an ordered registry of read-only checks against a
//! [`cluster::ClusterReader`], classifies the outcomes into a pass/warn/fail
//! verdict and renders the result into durable artifacts.
//!
//! The pipeline flows one way:
//! - [`engine::registry`]: ordered, validated check definitions per mode
//! - [`engine::orchestrator`]: sequential execution with timeout, retry and abort policy
//! - [`engine::result`]: verdict computation and tallies
//! - [`output`]: console summary, audit log lines and report documents
//!
//! # Example
//!
//! ```no_run
//! use upgrade_preflight::cluster::snapshot::SnapshotReader;
//! use upgrade_preflight::config::ValidationConfig;
//! use upgrade_preflight::session::{ClusterTarget, Session};
//! use upgrade_preflight::Mode;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), upgrade_preflight::PreflightError> {
//! let reader = SnapshotReader::from_path("cluster.yaml")?;
//! let target = ClusterTarget::new("prod-east", "https://api.prod-east:6443", Arc::new(reader));
//! let session = Session::new(ValidationConfig::default())?;
//! let outcome = session.run_mode(&target, Mode::Pre).await;
//! println!("verdict: {}", outcome.report.verdict);
//! # Ok(())
//! # }
//! ```

pub mod checks;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod events;
pub mod logging;
pub mod output;
pub mod session;
pub mod version;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use engine::context::{CheckResult, CheckStatus, CompletedRun, RunContext};
pub use engine::registry::{CheckDefinition, CheckRegistry};
pub use engine::result::{Report, Verdict};

/// Which side of the upgrade a run validates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Before the upgrade is started
    Pre,
    /// After the upgrade has rolled out
    Post,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Pre => "pre",
            Mode::Post => "post",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity tier attached to a check definition.
///
/// Governs how much a non-passing result weighs in the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check category used for grouping and selective execution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CheckCategory {
    /// API server, cluster version, etcd, cluster operators
    ControlPlane,
    /// Node readiness, machine config pools, utilization
    Nodes,
    /// Pods in critical namespaces, stuck operations
    Workloads,
    /// Persistent volumes
    Storage,
    /// Ingress controllers and cluster DNS
    Network,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 5] = [
        CheckCategory::ControlPlane,
        CheckCategory::Nodes,
        CheckCategory::Workloads,
        CheckCategory::Storage,
        CheckCategory::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::ControlPlane => "control-plane",
            CheckCategory::Nodes => "nodes",
            CheckCategory::Workloads => "workloads",
            CheckCategory::Storage => "storage",
            CheckCategory::Network => "network",
        }
    }

    /// Heading used by the console renderer.
    pub fn title(&self) -> &'static str {
        match self {
            CheckCategory::ControlPlane => "CONTROL PLANE CHECKS",
            CheckCategory::Nodes => "NODE CHECKS",
            CheckCategory::Workloads => "WORKLOAD CHECKS",
            CheckCategory::Storage => "STORAGE CHECKS",
            CheckCategory::Network => "NETWORK CHECKS",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load-time problems with the check registry or configuration.
///
/// Always fatal: a run never starts when one of these is raised.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate check id '{id}' in {mode} registry")]
    DuplicateCheck { id: String, mode: Mode },

    #[error("check '{id}' depends on unknown check '{dependency}'")]
    UnknownDependency { id: String, dependency: String },

    #[error("dependency cycle between checks: {}", .ids.join(" -> "))]
    DependencyCycle { ids: Vec<String> },

    #[error("override refers to unknown check '{id}'")]
    UnknownCheck { id: String },

    #[error("invalid thresholds for '{id}': warning {warning} / critical {critical}")]
    InvalidThreshold {
        id: String,
        warning: String,
        critical: String,
    },

    #[error("invalid retry policy for '{id}': {reason}")]
    InvalidRetry { id: String, reason: String },

    #[error("invalid configuration field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("failed to parse configuration {path}: {message}")]
    Parse { path: String, message: String },

    #[error("no clusters to validate: pass --snapshot or list clusters in the configuration")]
    NoTargets,
}

/// Top-level error type for upgrade-preflight operations.
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot load cluster snapshot {}: {message}", .path.display())]
    Snapshot { path: PathBuf, message: String },

    #[error("I/O error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("validation task for cluster '{cluster}' did not complete: {message}")]
    Task { cluster: String, message: String },
}

impl PreflightError {
    /// Whether this error came from persisting artifacts rather than from
    /// configuration or run setup.
    pub fn is_io(&self) -> bool {
        matches!(self, PreflightError::Io { .. })
    }
}
