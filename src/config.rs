//! Run configuration.
//!
//! One immutable [`ValidationConfig`] record carries every toggle and
//! threshold a run needs. It is built once (defaults, then an optional YAML
//! file, then command line overrides) and passed explicitly to the registry
//! builder, the execution engine and the aggregator.

use crate::{CheckCategory, ConfigError, Mode, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Namespaces whose pods must be healthy around an upgrade.
pub const DEFAULT_CRITICAL_NAMESPACES: [&str; 8] = [
    "openshift-apiserver",
    "openshift-etcd",
    "openshift-kube-apiserver",
    "openshift-kube-controller-manager",
    "openshift-kube-scheduler",
    "openshift-ingress",
    "openshift-dns",
    "openshift-machine-config-operator",
];

/// Per-check adjustments applied on top of the built-in catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckOverride {
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
    pub warning: Option<f64>,
    pub critical: Option<f64>,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// A cluster to validate, as listed in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Snapshot file the cluster state is read from
    pub snapshot: PathBuf,
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// A failed or errored critical check fails a pre-upgrade run
    pub fail_on_pre_check_errors: bool,
    /// A failed or errored critical check fails a post-upgrade run
    pub fail_on_post_check_errors: bool,
    /// Pause between the pre and post runs in `both` mode, in seconds
    pub post_upgrade_wait_time: u64,
    /// Abort the run as soon as a critical check fails or errors
    pub abort_on_critical_failure: bool,
    /// Default per-attempt timeout, in seconds
    pub check_timeout_secs: u64,
    /// Default attempts for retryable errors
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Categories to run (empty = all)
    pub categories: Vec<CheckCategory>,
    /// Check ids to leave out of the run
    pub skip_checks: Vec<String>,
    pub critical_namespaces: Vec<String>,
    /// Version the cluster is expected to report after the upgrade
    pub target_version: Option<String>,
    /// Age after which a Pending or Terminating pod counts as stuck, in seconds
    pub stuck_after_secs: u64,
    pub checks: BTreeMap<String, CheckOverride>,
    pub clusters: Vec<ClusterEntry>,
    pub output_dir: PathBuf,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            fail_on_pre_check_errors: true,
            fail_on_post_check_errors: true,
            post_upgrade_wait_time: 0,
            abort_on_critical_failure: false,
            check_timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
            categories: Vec::new(),
            skip_checks: Vec::new(),
            critical_namespaces: DEFAULT_CRITICAL_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
            target_version: None,
            stuck_after_secs: 900,
            checks: BTreeMap::new(),
            clusters: Vec::new(),
            output_dir: PathBuf::from("preflight-reports"),
        }
    }
}

impl ValidationConfig {
    /// Load configuration from a YAML (or JSON) file. Absent keys keep their
    /// defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ValidationConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRetry {
                id: "*".to_string(),
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        if self.critical_namespaces.iter().all(|ns| ns.trim().is_empty()) {
            return Err(ConfigError::InvalidField {
                field: "critical_namespaces".to_string(),
                reason: "at least one namespace is required".to_string(),
            });
        }
        for (id, ov) in &self.checks {
            if ov.max_attempts == Some(0) {
                return Err(ConfigError::InvalidRetry {
                    id: id.clone(),
                    reason: "max_attempts must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// The fail-on-error toggle governing runs of the given mode.
    pub fn fail_on_errors(&self, mode: Mode) -> bool {
        match mode {
            Mode::Pre => self.fail_on_pre_check_errors,
            Mode::Post => self.fail_on_post_check_errors,
        }
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn post_upgrade_wait(&self) -> Duration {
        Duration::from_secs(self.post_upgrade_wait_time)
    }

    pub fn stuck_after(&self) -> Duration {
        Duration::from_secs(self.stuck_after_secs)
    }

    /// Whether checks of this category take part in the run.
    pub fn category_selected(&self, category: CheckCategory) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }

    pub fn check_override(&self, id: &str) -> Option<&CheckOverride> {
        self.checks.get(id)
    }
}
