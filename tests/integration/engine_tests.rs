//! Engine integration tests.
//!
//! Sequential execution, retry, timeout, abort, dependency and cancellation
//! behavior of the orchestrator against mock readers.

use crate::mocks::{query, MockCluster};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use upgrade_preflight::cluster::{ClusterReader, ReaderError, VolumePhase};
use upgrade_preflight::config::ValidationConfig;
use upgrade_preflight::engine::cancel::cancellation;
use upgrade_preflight::engine::context::{ClusterIdentity, SkipReason};
use upgrade_preflight::engine::orchestrator::Orchestrator;
use upgrade_preflight::engine::result::aggregate;
use upgrade_preflight::{CheckRegistry, CheckStatus, CompletedRun, Mode, RunContext, Verdict};

fn context(mode: Mode, config: &ValidationConfig) -> RunContext {
    RunContext::new(
        ClusterIdentity::new("mock", "https://api.mock.example:6443"),
        mode,
        Arc::new(config.clone()),
    )
}

async fn run_with(cluster: Arc<MockCluster>, config: ValidationConfig) -> CompletedRun {
    let registry = CheckRegistry::standard(&config).unwrap();
    let reader: Arc<dyn ClusterReader> = cluster;
    Orchestrator::new(reader)
        .run(context(Mode::Pre, &config), &registry)
        .await
}

fn status_of(run: &CompletedRun, id: &str) -> CheckStatus {
    run.results()
        .iter()
        .find(|r| r.check_id == id)
        .map(|r| r.status)
        .unwrap_or_else(|| panic!("no result for {}", id))
}

#[tokio::test]
async fn test_healthy_cluster_passes_every_check() {
    let config = ValidationConfig::default();
    let registry = CheckRegistry::standard(&config).unwrap();
    let run = run_with(Arc::new(MockCluster::healthy()), config).await;

    assert_eq!(run.results().len(), registry.len(Mode::Pre));
    for result in run.results() {
        assert_eq!(result.status, CheckStatus::Passed, "{}: {}", result.check_id, result.message);
        assert_eq!(result.attempts, 1);
    }

    let executed: Vec<&str> = run.results().iter().map(|r| r.check_id.as_str()).collect();
    let declared: Vec<&str> = registry
        .definitions(Mode::Pre)
        .iter()
        .map(|d| d.id.as_str())
        .collect();
    assert_eq!(executed, declared);
    assert_eq!(aggregate(&run).verdict, Verdict::Pass);
}

#[tokio::test]
async fn test_every_registered_check_gets_exactly_one_result() {
    let cluster = MockCluster::healthy()
        .fail_always(query::CLUSTER_VERSION, ReaderError::Auth("token expired".to_string()));
    let config = ValidationConfig::default();
    let registry = CheckRegistry::standard(&config).unwrap();
    let run = run_with(Arc::new(cluster), config).await;

    let ids: HashSet<&str> = run.results().iter().map(|r| r.check_id.as_str()).collect();
    assert_eq!(ids.len(), run.results().len());
    assert_eq!(run.results().len(), registry.len(Mode::Pre));
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_retried_until_success() {
    let cluster = Arc::new(
        MockCluster::healthy()
            .fail_once(query::NODES, ReaderError::transient("connection reset"))
            .fail_once(query::NODES, ReaderError::Timeout(Duration::from_secs(5))),
    );
    let run = run_with(Arc::clone(&cluster), ValidationConfig::default()).await;

    let result = run
        .results()
        .iter()
        .find(|r| r.check_id == "node-readiness")
        .unwrap();
    assert_eq!(result.status, CheckStatus::Passed);
    assert_eq!(result.attempts, 3);
    assert_eq!(cluster.calls(query::NODES), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_is_errored() {
    let cluster = Arc::new(
        MockCluster::healthy()
            .fail_always(query::ETCD, ReaderError::Query("etcd endpoint returned 500".to_string())),
    );
    let run = run_with(Arc::clone(&cluster), ValidationConfig::default()).await;

    let result = run
        .results()
        .iter()
        .find(|r| r.check_id == "etcd-health")
        .unwrap();
    assert_eq!(result.status, CheckStatus::Errored);
    assert_eq!(result.attempts, 3);
    assert!(result.message.contains("after 3 attempts"), "{}", result.message);
    assert_eq!(cluster.calls(query::ETCD), 3);

    // Query errors are scoped to the check; the run carries on.
    assert_eq!(run.abort_reason(), None);
    assert_eq!(status_of(&run, "ingress-dns"), CheckStatus::Passed);
    assert_eq!(aggregate(&run).verdict, Verdict::Fail);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    let cluster = Arc::new(
        MockCluster::healthy()
            .fail_always(query::VOLUMES, ReaderError::transient("no route to host")),
    );
    let config = ValidationConfig {
        max_attempts: 4,
        initial_backoff_ms: 1000,
        max_backoff_ms: 3000,
        categories: vec![upgrade_preflight::CheckCategory::Storage],
        ..Default::default()
    };

    let started = tokio::time::Instant::now();
    let run = run_with(Arc::clone(&cluster), config).await;
    let elapsed = started.elapsed();

    assert_eq!(status_of(&run, "persistent-volumes"), CheckStatus::Errored);
    assert_eq!(cluster.calls(query::VOLUMES), 4);
    // 1s + 2s + 3s (capped)
    assert!(elapsed >= Duration::from_secs(6), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(7), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_slow_check_times_out_and_dependents_skip() {
    let cluster = Arc::new(MockCluster::healthy().delay(query::PROBE_API, Duration::from_secs(120)));
    let config = ValidationConfig {
        check_timeout_secs: 2,
        max_attempts: 1,
        ..Default::default()
    };
    let run = run_with(cluster, config).await;

    let api = &run.results()[0];
    assert_eq!(api.check_id, "api-responsiveness");
    assert_eq!(api.status, CheckStatus::Errored);
    assert!(api.message.contains("timed out"), "{}", api.message);

    let version = run
        .results()
        .iter()
        .find(|r| r.check_id == "cluster-version")
        .unwrap();
    assert_eq!(version.status, CheckStatus::Skipped);
    assert_eq!(
        version.skip_reason,
        Some(SkipReason::DependencyUnmet {
            dependency: "api-responsiveness".to_string()
        })
    );
    // Independent checks still run.
    assert_eq!(status_of(&run, "persistent-volumes"), CheckStatus::Passed);
}

#[tokio::test]
async fn test_auth_error_aborts_run() {
    let cluster = Arc::new(
        MockCluster::healthy()
            .fail_always(query::CLUSTER_VERSION, ReaderError::Auth("token expired".to_string())),
    );
    let run = run_with(Arc::clone(&cluster), ValidationConfig::default()).await;

    assert_eq!(status_of(&run, "api-responsiveness"), CheckStatus::Passed);
    let version = run
        .results()
        .iter()
        .find(|r| r.check_id == "cluster-version")
        .unwrap();
    assert_eq!(version.status, CheckStatus::Errored);
    assert_eq!(version.attempts, 1);
    assert_eq!(cluster.calls(query::CLUSTER_VERSION), 1);

    let after: Vec<_> = run.results().iter().skip(2).collect();
    assert!(!after.is_empty());
    for result in after {
        assert_eq!(result.status, CheckStatus::Skipped);
        assert_eq!(result.skip_reason, Some(SkipReason::RunAborted));
    }

    let reason = run.abort_reason().unwrap();
    assert!(reason.contains("token expired"), "{}", reason);
    assert!(reason.contains("cluster-version"), "{}", reason);
    assert_eq!(aggregate(&run).verdict, Verdict::Fail);
}

#[tokio::test]
async fn test_endpoint_down_aborts_at_first_check() {
    let cluster = Arc::new(
        MockCluster::healthy()
            .fail_once(query::PROBE_API, ReaderError::endpoint_down("connection refused")),
    );
    let run = run_with(cluster, ValidationConfig::default()).await;

    assert_eq!(run.results()[0].status, CheckStatus::Errored);
    assert!(run.results()[1..]
        .iter()
        .all(|r| r.skip_reason == Some(SkipReason::RunAborted)));
    assert!(run.abort_reason().is_some());
}

#[tokio::test]
async fn test_failed_dependency_skips_dependents() {
    let cluster = Arc::new(MockCluster::with_not_ready_worker());
    let run = run_with(Arc::clone(&cluster), ValidationConfig::default()).await;

    assert_eq!(status_of(&run, "node-readiness"), CheckStatus::Failed);
    for id in ["machine-config-pools", "resource-utilization"] {
        let result = run.results().iter().find(|r| r.check_id == id).unwrap();
        assert_eq!(result.status, CheckStatus::Skipped);
        assert_eq!(
            result.skip_reason,
            Some(SkipReason::DependencyUnmet {
                dependency: "node-readiness".to_string()
            })
        );
    }
    assert_eq!(cluster.calls(query::POOLS), 0);
    assert_eq!(cluster.calls(query::METRICS), 0);
}

#[tokio::test]
async fn test_warned_dependency_counts_as_met() {
    let cluster = Arc::new(MockCluster::healthy().with_api_latency(1500));
    let run = run_with(cluster, ValidationConfig::default()).await;

    assert_eq!(status_of(&run, "api-responsiveness"), CheckStatus::Warned);
    assert_eq!(status_of(&run, "cluster-version"), CheckStatus::Passed);
    assert_eq!(status_of(&run, "etcd-health"), CheckStatus::Passed);
}

#[tokio::test]
async fn test_fail_fast_on_critical_failure() {
    let config = ValidationConfig {
        abort_on_critical_failure: true,
        ..Default::default()
    };
    let run = run_with(Arc::new(MockCluster::with_not_ready_worker()), config).await;

    let reason = run.abort_reason().unwrap();
    assert!(
        reason.contains("critical check 'node-readiness' failed"),
        "{}",
        reason
    );
    let index = run
        .results()
        .iter()
        .position(|r| r.check_id == "node-readiness")
        .unwrap();
    assert!(run.results()[index + 1..]
        .iter()
        .all(|r| r.skip_reason == Some(SkipReason::RunAborted)));
}

#[tokio::test]
async fn test_fail_fast_ignores_non_critical_failures() {
    let config = ValidationConfig {
        abort_on_critical_failure: true,
        ..Default::default()
    };
    let cluster = MockCluster::healthy().with_volume("pv-data", VolumePhase::Failed);
    let run = run_with(Arc::new(cluster), config).await;

    assert_eq!(status_of(&run, "persistent-volumes"), CheckStatus::Failed);
    assert_eq!(run.abort_reason(), None);
    assert_eq!(status_of(&run, "ingress-dns"), CheckStatus::Passed);
}

#[tokio::test]
async fn test_fail_fast_inert_when_errors_do_not_fail_the_mode() {
    let config = ValidationConfig {
        abort_on_critical_failure: true,
        fail_on_pre_check_errors: false,
        ..Default::default()
    };
    let run = run_with(Arc::new(MockCluster::with_not_ready_worker()), config).await;

    assert_eq!(run.abort_reason(), None);
    assert_eq!(aggregate(&run).verdict, Verdict::Warn);
}

#[tokio::test]
async fn test_panicking_check_is_contained() {
    let cluster = Arc::new(MockCluster::healthy().panic_on(query::VOLUMES));
    let run = run_with(Arc::clone(&cluster), ValidationConfig::default()).await;

    let result = run
        .results()
        .iter()
        .find(|r| r.check_id == "persistent-volumes")
        .unwrap();
    assert_eq!(result.status, CheckStatus::Errored);
    assert_eq!(result.attempts, 1);
    assert!(result.message.contains("panicked"), "{}", result.message);
    assert_eq!(cluster.calls(query::VOLUMES), 1);
    assert_eq!(status_of(&run, "ingress-dns"), CheckStatus::Passed);
}

#[tokio::test]
async fn test_cancel_before_start_skips_everything() {
    let config = ValidationConfig::default();
    let registry = CheckRegistry::standard(&config).unwrap();
    let (handle, signal) = cancellation();
    handle.cancel();

    let cluster = Arc::new(MockCluster::healthy());
    let reader: Arc<dyn ClusterReader> = cluster.clone();
    let run = Orchestrator::new(reader)
        .with_cancellation(signal)
        .run(context(Mode::Pre, &config), &registry)
        .await;

    assert!(run.cancelled());
    assert_eq!(run.results().len(), registry.len(Mode::Pre));
    assert!(run
        .results()
        .iter()
        .all(|r| r.skip_reason == Some(SkipReason::RunCancelled)));
    assert_eq!(cluster.calls(query::PROBE_API), 0);
    assert_eq!(aggregate(&run).verdict, Verdict::Warn);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let config = ValidationConfig::default();
    let registry = CheckRegistry::standard(&config).unwrap();
    let (handle, signal) = cancellation();
    let cluster = Arc::new(
        MockCluster::healthy().fail_always(query::NODES, ReaderError::transient("i/o timeout")),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });

    let reader: Arc<dyn ClusterReader> = cluster.clone();
    let run = Orchestrator::new(reader)
        .with_cancellation(signal)
        .run(context(Mode::Pre, &config), &registry)
        .await;

    let nodes = run
        .results()
        .iter()
        .find(|r| r.check_id == "node-readiness")
        .unwrap();
    assert_eq!(nodes.status, CheckStatus::Skipped);
    assert_eq!(nodes.skip_reason, Some(SkipReason::RunCancelled));
    assert_eq!(nodes.attempts, 1);
    assert!(nodes.message.contains("cancelled before retry"), "{}", nodes.message);
    assert_eq!(cluster.calls(query::NODES), 1);

    let index = run
        .results()
        .iter()
        .position(|r| r.check_id == "node-readiness")
        .unwrap();
    assert!(run.results()[index + 1..]
        .iter()
        .all(|r| r.skip_reason == Some(SkipReason::RunCancelled)));
    assert!(run.cancelled());
    assert!(run.abort_reason().is_none());

    let report = aggregate(&run);
    assert_eq!(report.counts.errored, 0);
    assert_eq!(report.verdict, Verdict::Warn);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_on_every_attempt_is_errored_after_max_attempts() {
    let cluster =
        Arc::new(MockCluster::healthy().delay(query::PROBE_API, Duration::from_secs(120)));
    let config = ValidationConfig {
        check_timeout_secs: 2,
        max_attempts: 3,
        ..Default::default()
    };
    let run = run_with(Arc::clone(&cluster), config).await;

    let api = &run.results()[0];
    assert_eq!(api.check_id, "api-responsiveness");
    assert_eq!(api.status, CheckStatus::Errored);
    assert_eq!(api.attempts, 3);
    assert!(api.message.contains("timed out"), "{}", api.message);
    assert!(api.message.contains("after 3 attempts"), "{}", api.message);
    assert_eq!(cluster.calls(query::PROBE_API), 3);
}
