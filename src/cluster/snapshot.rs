//! File-backed cluster reader.
//!
//! Serves queries from a captured [`ClusterSnapshot`] (YAML or JSON). Used for
//! offline validation of exported cluster state and as a fixture source.
//!
//! # Graceful Degradation
//!
//! - Missing snapshot section: the query returns `ReaderError::Query`
//! - Unreadable or malformed file: construction fails with `PreflightError::Snapshot`

use super::{
    ApiProbe, ClusterReader, ClusterVersionInfo, EtcdStatus, IngressStatus, MachineConfigPoolInfo,
    NodeInfo, OperatorInfo, PersistentVolumeInfo, PodInfo, ReaderError, ResourceMetrics,
};
use crate::PreflightError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Point-in-time export of the state a run queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSnapshot {
    pub endpoint: Option<String>,
    pub api: Option<ApiProbe>,
    pub cluster_version: Option<ClusterVersionInfo>,
    pub nodes: Option<Vec<NodeInfo>>,
    pub operators: Option<Vec<OperatorInfo>>,
    pub etcd: Option<EtcdStatus>,
    pub persistent_volumes: Option<Vec<PersistentVolumeInfo>>,
    pub pods: Option<Vec<PodInfo>>,
    pub metrics: Option<ResourceMetrics>,
    pub ingress: Option<IngressStatus>,
    pub machine_config_pools: Option<Vec<MachineConfigPoolInfo>>,
}

impl ClusterSnapshot {
    /// Parse a snapshot document. JSON is a subset of YAML, so one parser
    /// covers both.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

/// [`ClusterReader`] backed by a [`ClusterSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    snapshot: ClusterSnapshot,
}

impl SnapshotReader {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        SnapshotReader { snapshot }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PreflightError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PreflightError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let snapshot = ClusterSnapshot::parse(&content).map_err(|e| PreflightError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(SnapshotReader::new(snapshot))
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.snapshot.endpoint.as_deref()
    }
}

fn section<T: Clone>(value: &Option<T>, name: &str) -> Result<T, ReaderError> {
    value
        .clone()
        .ok_or_else(|| ReaderError::Query(format!("snapshot has no '{}' section", name)))
}

#[async_trait]
impl ClusterReader for SnapshotReader {
    async fn probe_api(&self) -> Result<ApiProbe, ReaderError> {
        section(&self.snapshot.api, "api")
    }

    async fn cluster_version(&self) -> Result<ClusterVersionInfo, ReaderError> {
        section(&self.snapshot.cluster_version, "cluster_version")
    }

    async fn nodes(&self) -> Result<Vec<NodeInfo>, ReaderError> {
        section(&self.snapshot.nodes, "nodes")
    }

    async fn operators(&self) -> Result<Vec<OperatorInfo>, ReaderError> {
        section(&self.snapshot.operators, "operators")
    }

    async fn etcd_status(&self) -> Result<EtcdStatus, ReaderError> {
        section(&self.snapshot.etcd, "etcd")
    }

    async fn persistent_volumes(&self) -> Result<Vec<PersistentVolumeInfo>, ReaderError> {
        section(&self.snapshot.persistent_volumes, "persistent_volumes")
    }

    async fn pods(&self, namespaces: &[String]) -> Result<Vec<PodInfo>, ReaderError> {
        let pods = section(&self.snapshot.pods, "pods")?;
        if namespaces.is_empty() {
            return Ok(pods);
        }
        Ok(pods
            .into_iter()
            .filter(|p| namespaces.contains(&p.namespace))
            .collect())
    }

    async fn resource_metrics(&self) -> Result<ResourceMetrics, ReaderError> {
        section(&self.snapshot.metrics, "metrics")
    }

    async fn ingress_status(&self) -> Result<IngressStatus, ReaderError> {
        section(&self.snapshot.ingress, "ingress")
    }

    async fn machine_config_pools(&self) -> Result<Vec<MachineConfigPoolInfo>, ReaderError> {
        section(&self.snapshot.machine_config_pools, "machine_config_pools")
    }
}
