//! Cluster health checks.
//!
//! Every check is a [`CheckKind`] variant; the variants differ only in their
//! evaluate logic and default metadata. Evaluate functions are grouped by
//! category:
//! - Control plane: API responsiveness, cluster version, etcd, operators
//! - Nodes: readiness, machine config pools, resource utilization
//! - Workloads: critical namespace pods, stuck operations
//! - Storage: persistent volumes
//! - Network: ingress controllers and DNS
//!
//! # Outcome Rules
//!
//! - Reader errors propagate as `Err` so the engine can retry or abort
//! - Checks without a threshold band only ever pass or fail
//! - `Warned` is produced exclusively by a value inside the warning band
//!
//! Checks never panic and never mutate the cluster.

pub mod control_plane;
pub mod network;
pub mod nodes;
pub mod storage;
pub mod workloads;

use crate::cluster::{ClusterReader, ReaderError};
use crate::config::ValidationConfig;
use crate::engine::registry::{Band, ThresholdBand};
use crate::{CheckCategory, Mode, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Most names listed in one message.
const MAX_LISTED: usize = 10;

/// The kind of check, selecting its evaluate logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    ApiResponsiveness,
    ClusterVersion,
    EtcdHealth,
    OperatorHealth,
    NodeReadiness,
    MachineConfigPools,
    ResourceUtilization,
    CriticalPods,
    StuckOperations,
    PersistentVolumes,
    IngressDns,
}

impl CheckKind {
    /// Built-in catalogue in declaration order.
    pub const ALL: [CheckKind; 11] = [
        CheckKind::ApiResponsiveness,
        CheckKind::ClusterVersion,
        CheckKind::EtcdHealth,
        CheckKind::OperatorHealth,
        CheckKind::NodeReadiness,
        CheckKind::MachineConfigPools,
        CheckKind::ResourceUtilization,
        CheckKind::CriticalPods,
        CheckKind::StuckOperations,
        CheckKind::PersistentVolumes,
        CheckKind::IngressDns,
    ];

    /// Default id used in the built-in registry
    pub fn id(&self) -> &'static str {
        match self {
            CheckKind::ApiResponsiveness => "api-responsiveness",
            CheckKind::ClusterVersion => "cluster-version",
            CheckKind::EtcdHealth => "etcd-health",
            CheckKind::OperatorHealth => "operator-health",
            CheckKind::NodeReadiness => "node-readiness",
            CheckKind::MachineConfigPools => "machine-config-pools",
            CheckKind::ResourceUtilization => "resource-utilization",
            CheckKind::CriticalPods => "critical-pods",
            CheckKind::StuckOperations => "stuck-operations",
            CheckKind::PersistentVolumes => "persistent-volumes",
            CheckKind::IngressDns => "ingress-dns",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::ApiResponsiveness => "API Responsiveness",
            CheckKind::ClusterVersion => "Cluster Version",
            CheckKind::EtcdHealth => "etcd Quorum and Pod Health",
            CheckKind::OperatorHealth => "Cluster Operator Health",
            CheckKind::NodeReadiness => "Node Readiness",
            CheckKind::MachineConfigPools => "Machine Config Pool Rollout",
            CheckKind::ResourceUtilization => "Resource Utilization",
            CheckKind::CriticalPods => "Critical Namespace Pods",
            CheckKind::StuckOperations => "Stuck Operations",
            CheckKind::PersistentVolumes => "Persistent Volumes",
            CheckKind::IngressDns => "Ingress and DNS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CheckKind::ApiResponsiveness => "Measure API server round-trip latency",
            CheckKind::ClusterVersion => {
                "Verify cluster version, update channel and update progress"
            }
            CheckKind::EtcdHealth => "Verify etcd quorum, leader election and member pods",
            CheckKind::OperatorHealth => "Check cluster operators for degraded or unavailable state",
            CheckKind::NodeReadiness => "Verify every node reports Ready",
            CheckKind::MachineConfigPools => "Verify machine config pools are fully rolled out",
            CheckKind::ResourceUtilization => "Compare node CPU and memory usage against thresholds",
            CheckKind::CriticalPods => "Verify pods in critical namespaces are running and ready",
            CheckKind::StuckOperations => "Detect pods stuck in Pending or Terminating",
            CheckKind::PersistentVolumes => "Check persistent volumes for Failed or Pending phase",
            CheckKind::IngressDns => "Verify ingress controllers and cluster DNS are available",
        }
    }

    pub fn category(&self) -> CheckCategory {
        match self {
            CheckKind::ApiResponsiveness
            | CheckKind::ClusterVersion
            | CheckKind::EtcdHealth
            | CheckKind::OperatorHealth => CheckCategory::ControlPlane,
            CheckKind::NodeReadiness
            | CheckKind::MachineConfigPools
            | CheckKind::ResourceUtilization => CheckCategory::Nodes,
            CheckKind::CriticalPods | CheckKind::StuckOperations => CheckCategory::Workloads,
            CheckKind::PersistentVolumes => CheckCategory::Storage,
            CheckKind::IngressDns => CheckCategory::Network,
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            CheckKind::ResourceUtilization
            | CheckKind::StuckOperations
            | CheckKind::PersistentVolumes => Severity::Warning,
            _ => Severity::Critical,
        }
    }

    pub fn default_thresholds(&self) -> Option<ThresholdBand> {
        match self {
            // milliseconds
            CheckKind::ApiResponsiveness => Some(ThresholdBand::new(1000.0, 5000.0)),
            // percent of allocatable
            CheckKind::ResourceUtilization => Some(ThresholdBand::new(80.0, 95.0)),
            // stuck pod count
            CheckKind::StuckOperations => Some(ThresholdBand::new(1.0, 5.0)),
            _ => None,
        }
    }

    pub fn default_dependencies(&self) -> &'static [&'static str] {
        match self {
            CheckKind::ClusterVersion
            | CheckKind::EtcdHealth
            | CheckKind::NodeReadiness
            | CheckKind::CriticalPods => &["api-responsiveness"],
            CheckKind::OperatorHealth => &["cluster-version"],
            CheckKind::MachineConfigPools | CheckKind::ResourceUtilization => &["node-readiness"],
            _ => &[],
        }
    }

    /// Run this check's evaluate logic against a reader.
    pub async fn evaluate(
        &self,
        reader: &dyn ClusterReader,
        ctx: &EvalContext,
    ) -> Result<Evaluation, ReaderError> {
        match self {
            CheckKind::ApiResponsiveness => control_plane::api_responsiveness(reader, ctx).await,
            CheckKind::ClusterVersion => control_plane::cluster_version(reader, ctx).await,
            CheckKind::EtcdHealth => control_plane::etcd_health(reader, ctx).await,
            CheckKind::OperatorHealth => control_plane::operator_health(reader, ctx).await,
            CheckKind::NodeReadiness => nodes::node_readiness(reader, ctx).await,
            CheckKind::MachineConfigPools => nodes::machine_config_pools(reader, ctx).await,
            CheckKind::ResourceUtilization => nodes::resource_utilization(reader, ctx).await,
            CheckKind::CriticalPods => workloads::critical_pods(reader, ctx).await,
            CheckKind::StuckOperations => workloads::stuck_operations(reader, ctx).await,
            CheckKind::PersistentVolumes => storage::persistent_volumes(reader, ctx).await,
            CheckKind::IngressDns => network::ingress_dns(reader, ctx).await,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Inputs an evaluation may consult besides the reader.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub mode: Mode,
    pub thresholds: Option<ThresholdBand>,
    pub config: Arc<ValidationConfig>,
}

/// Classification of a completed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Warned,
    Failed,
}

impl From<Band> for Outcome {
    fn from(band: Band) -> Self {
        match band {
            Band::Normal => Outcome::Passed,
            Band::Warning => Outcome::Warned,
            Band::Critical => Outcome::Failed,
        }
    }
}

/// A value observed while evaluating a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observed {
    Flag(bool),
    Count(u64),
    Number(f64),
    Text(String),
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Flag(v) => write!(f, "{}", v),
            Observed::Count(v) => write!(f, "{}", v),
            Observed::Number(v) => write!(f, "{:.1}", v),
            Observed::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Observed {
    fn from(v: bool) -> Self {
        Observed::Flag(v)
    }
}

impl From<u64> for Observed {
    fn from(v: u64) -> Self {
        Observed::Count(v)
    }
}

impl From<usize> for Observed {
    fn from(v: usize) -> Self {
        Observed::Count(v as u64)
    }
}

impl From<f64> for Observed {
    fn from(v: f64) -> Self {
        Observed::Number(v)
    }
}

impl From<&str> for Observed {
    fn from(v: &str) -> Self {
        Observed::Text(v.to_string())
    }
}

impl From<String> for Observed {
    fn from(v: String) -> Self {
        Observed::Text(v)
    }
}

/// Result of one successful evaluate call.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub message: String,
    pub observed: BTreeMap<String, Observed>,
}

impl Evaluation {
    pub fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Evaluation {
            outcome,
            message: message.into(),
            observed: BTreeMap::new(),
        }
    }

    pub fn passed(message: impl Into<String>) -> Self {
        Self::new(Outcome::Passed, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(Outcome::Failed, message)
    }

    pub fn observe(mut self, key: &str, value: impl Into<Observed>) -> Self {
        self.observed.insert(key.to_string(), value.into());
        self
    }
}

/// Join names for a message, truncating long lists.
pub(crate) fn list_names<S: AsRef<str>>(names: &[S]) -> String {
    let listed = names
        .iter()
        .take(MAX_LISTED)
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    let more = names.len().saturating_sub(MAX_LISTED);
    if more > 0 {
        format!("{} (+{} more)", listed, more)
    } else {
        listed
    }
}
