//! Mock cluster reader for testing without a live cluster.
//!
//! Provides a configurable [`MockCluster`] that can simulate:
//! - Healthy clusters and single degraded components
//! - Scripted reader errors per query (once or on every call)
//! - Slow queries, for timeout behavior
//! - Panicking queries
//! - Per-query call counts, for retry assertions

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use upgrade_preflight::cluster::snapshot::ClusterSnapshot;
use upgrade_preflight::cluster::{
    ApiProbe, ClusterReader, ClusterVersionInfo, EtcdMember, EtcdStatus, IngressControllerInfo,
    IngressStatus, MachineConfigPoolInfo, NodeInfo, NodeUsage, OperatorInfo,
    PersistentVolumeInfo, PodInfo, PodPhase, ReaderError, ResourceMetrics, VolumePhase,
};
use upgrade_preflight::config::DEFAULT_CRITICAL_NAMESPACES;

/// Query names used to script failures, delays and call counts.
pub mod query {
    pub const PROBE_API: &str = "probe_api";
    pub const CLUSTER_VERSION: &str = "cluster_version";
    pub const NODES: &str = "nodes";
    pub const OPERATORS: &str = "operators";
    pub const ETCD: &str = "etcd_status";
    pub const VOLUMES: &str = "persistent_volumes";
    pub const PODS: &str = "pods";
    pub const METRICS: &str = "resource_metrics";
    pub const INGRESS: &str = "ingress_status";
    pub const POOLS: &str = "machine_config_pools";
}

pub const HEALTHY_VERSION: &str = "4.13.5";

/// Scriptable in-memory [`ClusterReader`].
#[derive(Debug, Default)]
pub struct MockCluster {
    pub state: ClusterSnapshot,
    scripted: Mutex<HashMap<&'static str, VecDeque<ReaderError>>>,
    persistent: HashMap<&'static str, ReaderError>,
    delays: HashMap<&'static str, Duration>,
    panics: HashSet<&'static str>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockCluster {
    /// Empty state: every query fails with a query error.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A 4-node cluster on 4.13.5 with every component healthy.
    pub fn healthy() -> Self {
        let masters = ["master-0", "master-1", "master-2"];
        let nodes = masters
            .iter()
            .map(|name| node(name, "master", true))
            .chain(std::iter::once(node("worker-0", "worker", true)))
            .collect();

        let pods = DEFAULT_CRITICAL_NAMESPACES
            .iter()
            .map(|ns| running_pod(ns, &format!("{}-0", ns.trim_start_matches("openshift-"))))
            .collect();

        let operators = [
            "authentication",
            "dns",
            "etcd",
            "ingress",
            "kube-apiserver",
            "machine-config",
            "network",
        ]
        .iter()
        .map(|name| OperatorInfo {
            name: name.to_string(),
            available: true,
            degraded: false,
            progressing: false,
            version: Some(HEALTHY_VERSION.to_string()),
        })
        .collect();

        let state = ClusterSnapshot {
            endpoint: Some("https://api.mock.example:6443".to_string()),
            api: Some(ApiProbe {
                latency_ms: 42,
                healthy: true,
            }),
            cluster_version: Some(ClusterVersionInfo {
                version: HEALTHY_VERSION.to_string(),
                channel: "stable-4.13".to_string(),
                desired_version: None,
                progressing: false,
                failing: None,
                available_updates: vec!["4.13.6".to_string()],
            }),
            nodes: Some(nodes),
            operators: Some(operators),
            etcd: Some(EtcdStatus {
                members: masters
                    .iter()
                    .map(|name| EtcdMember {
                        name: format!("etcd-{}", name),
                        healthy: true,
                        pod_ready: true,
                    })
                    .collect(),
                has_leader: true,
            }),
            persistent_volumes: Some(vec![
                volume("pv-registry", VolumePhase::Bound),
                volume("pv-prometheus", VolumePhase::Bound),
            ]),
            pods: Some(pods),
            metrics: Some(ResourceMetrics {
                nodes: ["master-0", "master-1", "master-2", "worker-0"]
                    .iter()
                    .map(|name| NodeUsage {
                        name: name.to_string(),
                        cpu_percent: 41.0,
                        memory_percent: 58.5,
                    })
                    .collect(),
            }),
            ingress: Some(IngressStatus {
                controllers: vec![IngressControllerInfo {
                    name: "default".to_string(),
                    available: true,
                    degraded: false,
                }],
                dns_available: true,
            }),
            machine_config_pools: Some(vec![pool("master", 3), pool("worker", 1)]),
        };

        MockCluster {
            state,
            ..Default::default()
        }
    }

    /// Healthy, except `worker-0` is NotReady.
    pub fn with_not_ready_worker() -> Self {
        let mut cluster = Self::healthy();
        if let Some(nodes) = cluster.state.nodes.as_mut() {
            for node in nodes.iter_mut().filter(|n| n.name == "worker-0") {
                node.ready = false;
            }
        }
        cluster
    }

    /// Healthy, except peak memory on `worker-0` is `percent`.
    pub fn with_memory_peak(mut self, percent: f64) -> Self {
        if let Some(metrics) = self.state.metrics.as_mut() {
            for usage in metrics.nodes.iter_mut().filter(|n| n.name == "worker-0") {
                usage.memory_percent = percent;
            }
        }
        self
    }

    pub fn with_api_latency(mut self, latency_ms: u64) -> Self {
        if let Some(api) = self.state.api.as_mut() {
            api.latency_ms = latency_ms;
        }
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        if let Some(info) = self.state.cluster_version.as_mut() {
            info.version = version.to_string();
        }
        if let Some(operators) = self.state.operators.as_mut() {
            for op in operators.iter_mut() {
                op.version = Some(version.to_string());
            }
        }
        self
    }

    pub fn with_volume(mut self, name: &str, phase: VolumePhase) -> Self {
        self.state
            .persistent_volumes
            .get_or_insert_with(Vec::new)
            .push(volume(name, phase));
        self
    }

    pub fn with_pod(mut self, pod: PodInfo) -> Self {
        self.state.pods.get_or_insert_with(Vec::new).push(pod);
        self
    }

    /// Fail the next call of `query` with `err`. Repeatable; errors are
    /// returned in the order they were scripted.
    pub fn fail_once(self, query: &'static str, err: ReaderError) -> Self {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.entry(query).or_default().push_back(err);
        }
        self
    }

    /// Fail every call of `query` with `err`.
    pub fn fail_always(mut self, query: &'static str, err: ReaderError) -> Self {
        self.persistent.insert(query, err);
        self
    }

    /// Delay every call of `query`.
    pub fn delay(mut self, query: &'static str, delay: Duration) -> Self {
        self.delays.insert(query, delay);
        self
    }

    /// Panic inside every call of `query`.
    pub fn panic_on(mut self, query: &'static str) -> Self {
        self.panics.insert(query);
        self
    }

    /// Number of times `query` was called.
    pub fn calls(&self, query: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(query).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    async fn enter(&self, query: &'static str) -> Result<(), ReaderError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(query).or_insert(0) += 1;
        }
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        if self.panics.contains(query) {
            panic!("mock reader panicked in {}", query);
        }
        let scripted = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut s| s.get_mut(query).and_then(VecDeque::pop_front));
        if let Some(err) = scripted {
            return Err(err);
        }
        match self.persistent.get(query) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn section<T: Clone>(value: &Option<T>, name: &str) -> Result<T, ReaderError> {
    value
        .clone()
        .ok_or_else(|| ReaderError::Query(format!("mock has no {} data", name)))
}

#[async_trait]
impl ClusterReader for MockCluster {
    async fn probe_api(&self) -> Result<ApiProbe, ReaderError> {
        self.enter(query::PROBE_API).await?;
        section(&self.state.api, query::PROBE_API)
    }

    async fn cluster_version(&self) -> Result<ClusterVersionInfo, ReaderError> {
        self.enter(query::CLUSTER_VERSION).await?;
        section(&self.state.cluster_version, query::CLUSTER_VERSION)
    }

    async fn nodes(&self) -> Result<Vec<NodeInfo>, ReaderError> {
        self.enter(query::NODES).await?;
        section(&self.state.nodes, query::NODES)
    }

    async fn operators(&self) -> Result<Vec<OperatorInfo>, ReaderError> {
        self.enter(query::OPERATORS).await?;
        section(&self.state.operators, query::OPERATORS)
    }

    async fn etcd_status(&self) -> Result<EtcdStatus, ReaderError> {
        self.enter(query::ETCD).await?;
        section(&self.state.etcd, query::ETCD)
    }

    async fn persistent_volumes(&self) -> Result<Vec<PersistentVolumeInfo>, ReaderError> {
        self.enter(query::VOLUMES).await?;
        section(&self.state.persistent_volumes, query::VOLUMES)
    }

    async fn pods(&self, namespaces: &[String]) -> Result<Vec<PodInfo>, ReaderError> {
        self.enter(query::PODS).await?;
        let pods = section(&self.state.pods, query::PODS)?;
        Ok(pods
            .into_iter()
            .filter(|p| namespaces.is_empty() || namespaces.contains(&p.namespace))
            .collect())
    }

    async fn resource_metrics(&self) -> Result<ResourceMetrics, ReaderError> {
        self.enter(query::METRICS).await?;
        section(&self.state.metrics, query::METRICS)
    }

    async fn ingress_status(&self) -> Result<IngressStatus, ReaderError> {
        self.enter(query::INGRESS).await?;
        section(&self.state.ingress, query::INGRESS)
    }

    async fn machine_config_pools(&self) -> Result<Vec<MachineConfigPoolInfo>, ReaderError> {
        self.enter(query::POOLS).await?;
        section(&self.state.machine_config_pools, query::POOLS)
    }
}

pub fn node(name: &str, role: &str, ready: bool) -> NodeInfo {
    NodeInfo {
        name: name.to_string(),
        ready,
        roles: vec![role.to_string()],
        unschedulable: false,
    }
}

pub fn running_pod(namespace: &str, name: &str) -> PodInfo {
    PodInfo {
        namespace: namespace.to_string(),
        name: name.to_string(),
        phase: PodPhase::Running,
        ready: true,
        restarts: 0,
        age_secs: 86_400,
        terminating: false,
    }
}

pub fn volume(name: &str, phase: VolumePhase) -> PersistentVolumeInfo {
    PersistentVolumeInfo {
        name: name.to_string(),
        phase,
        claim: None,
    }
}

pub fn pool(name: &str, machines: u32) -> MachineConfigPoolInfo {
    MachineConfigPoolInfo {
        name: name.to_string(),
        machine_count: machines,
        updated_machine_count: machines,
        ready_machine_count: machines,
        degraded_machine_count: 0,
        updating: false,
        degraded: false,
    }
}
