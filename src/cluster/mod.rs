//! Read-only view of cluster control-plane state.
//!
//! Provides:
//! - The [`ClusterReader`] capability consumed by every check
//! - Typed snapshots returned by each query
//! - The [`ReaderError`] taxonomy that drives retry and abort decisions
//!
//! Readers never mutate the cluster. One reader instance serves a whole run
//! and is shared by reference across checks.

pub mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors a cluster query can raise.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReaderError {
    /// Endpoint unreachable, DNS or TLS failure. `endpoint_down` marks the
    /// cluster endpoint itself as gone; otherwise the failure is transient.
    #[error("connectivity error: {message}")]
    Connectivity { message: String, endpoint_down: bool },

    /// Invalid or expired credential, or insufficient permission.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Malformed or unexpected response shape.
    #[error("query error: {0}")]
    Query(String),

    /// The check exceeded its allotted wait.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ReaderError {
    pub fn transient(message: impl Into<String>) -> Self {
        ReaderError::Connectivity {
            message: message.into(),
            endpoint_down: false,
        }
    }

    pub fn endpoint_down(message: impl Into<String>) -> Self {
        ReaderError::Connectivity {
            message: message.into(),
            endpoint_down: true,
        }
    }

    /// Errors that make the whole run pointless: the endpoint is gone or
    /// refuses our credentials.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            ReaderError::Auth(_)
                | ReaderError::Connectivity {
                    endpoint_down: true,
                    ..
                }
        )
    }

    /// Errors scoped to a single check that are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReaderError::Timeout(_)
                | ReaderError::Query(_)
                | ReaderError::Connectivity {
                    endpoint_down: false,
                    ..
                }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReaderError::Connectivity { .. } => "connectivity",
            ReaderError::Auth(_) => "auth",
            ReaderError::Query(_) => "query",
            ReaderError::Timeout(_) => "timeout",
        }
    }
}

/// Result of a lightweight round-trip against the API server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiProbe {
    pub latency_ms: u64,
    #[serde(default = "default_true")]
    pub healthy: bool,
}

/// Cluster version and update channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterVersionInfo {
    pub version: String,
    pub channel: String,
    /// Version an update is currently heading to, if any
    #[serde(default)]
    pub desired_version: Option<String>,
    #[serde(default)]
    pub progressing: bool,
    /// Message of a `Failing` condition, if set
    #[serde(default)]
    pub failing: Option<String>,
    #[serde(default)]
    pub available_updates: Vec<String>,
}

impl ClusterVersionInfo {
    /// An update has been requested but not completed.
    pub fn has_pending_update(&self) -> bool {
        self.progressing
            || self
                .desired_version
                .as_ref()
                .is_some_and(|desired| desired != &self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub ready: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub unschedulable: bool,
}

/// Cluster operator health flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub name: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub progressing: bool,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtcdMember {
    pub name: String,
    pub healthy: bool,
    #[serde(default = "default_true")]
    pub pod_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtcdStatus {
    pub members: Vec<EtcdMember>,
    #[serde(default = "default_true")]
    pub has_leader: bool,
}

impl EtcdStatus {
    pub fn healthy_members(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.healthy && m.pod_ready)
            .count()
    }

    /// Strict majority of members healthy.
    pub fn has_quorum(&self) -> bool {
        !self.members.is_empty() && self.healthy_members() > self.members.len() / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumePhase {
    Pending,
    Available,
    Bound,
    Released,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentVolumeInfo {
    pub name: String,
    pub phase: VolumePhase,
    #[serde(default)]
    pub claim: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub phase: PodPhase,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restarts: u32,
    #[serde(default)]
    pub age_secs: u64,
    /// Deletion requested but the pod is still present
    #[serde(default)]
    pub terminating: bool,
}

impl PodInfo {
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// CPU and memory usage of one node, as percentages of allocatable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub nodes: Vec<NodeUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressControllerInfo {
    pub name: String,
    pub available: bool,
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressStatus {
    pub controllers: Vec<IngressControllerInfo>,
    /// Cluster DNS operator reports Available
    pub dns_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfigPoolInfo {
    pub name: String,
    pub machine_count: u32,
    pub updated_machine_count: u32,
    #[serde(default)]
    pub ready_machine_count: u32,
    #[serde(default)]
    pub degraded_machine_count: u32,
    #[serde(default)]
    pub updating: bool,
    #[serde(default)]
    pub degraded: bool,
}

impl MachineConfigPoolInfo {
    pub fn rollout_complete(&self) -> bool {
        !self.updating && !self.degraded && self.updated_machine_count == self.machine_count
    }
}

/// Read-only query capability over cluster control-plane state.
///
/// Implementations must be safe to share across tasks; a run issues its
/// queries sequentially, but independent runs may hold their own readers on
/// different threads.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    async fn probe_api(&self) -> Result<ApiProbe, ReaderError>;

    async fn cluster_version(&self) -> Result<ClusterVersionInfo, ReaderError>;

    async fn nodes(&self) -> Result<Vec<NodeInfo>, ReaderError>;

    async fn operators(&self) -> Result<Vec<OperatorInfo>, ReaderError>;

    async fn etcd_status(&self) -> Result<EtcdStatus, ReaderError>;

    async fn persistent_volumes(&self) -> Result<Vec<PersistentVolumeInfo>, ReaderError>;

    /// Pods in the given namespaces. An empty slice means every namespace.
    async fn pods(&self, namespaces: &[String]) -> Result<Vec<PodInfo>, ReaderError>;

    async fn resource_metrics(&self) -> Result<ResourceMetrics, ReaderError>;

    async fn ingress_status(&self) -> Result<IngressStatus, ReaderError>;

    async fn machine_config_pools(&self) -> Result<Vec<MachineConfigPoolInfo>, ReaderError>;
}

fn default_true() -> bool {
    true
}
