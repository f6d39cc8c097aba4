//! End-to-end upgrade scenarios.
//!
//! Whole sessions against mock clusters, asserting on the verdict and the
//! operator-facing output.

use crate::mocks::{query, MockCluster, HEALTHY_VERSION};
use std::sync::Arc;
use upgrade_preflight::cluster::ReaderError;
use upgrade_preflight::config::ValidationConfig;
use upgrade_preflight::session::{ClusterTarget, RunOutcome, Session};
use upgrade_preflight::{CheckStatus, Mode, Verdict};

fn target(cluster: MockCluster) -> ClusterTarget {
    ClusterTarget::new("prod-east", "https://api.prod-east:6443", Arc::new(cluster))
}

async fn run(cluster: MockCluster, config: ValidationConfig, mode: Mode) -> RunOutcome {
    Session::new(config)
        .unwrap()
        .run_mode(&target(cluster), mode)
        .await
}

fn find<'a>(outcome: &'a RunOutcome, id: &str) -> &'a upgrade_preflight::CheckResult {
    outcome
        .report
        .results
        .iter()
        .find(|r| r.check_id == id)
        .unwrap_or_else(|| panic!("no result for {}", id))
}

#[tokio::test]
async fn test_healthy_cluster_before_upgrade() {
    let outcome = run(MockCluster::healthy(), ValidationConfig::default(), Mode::Pre).await;

    assert_eq!(outcome.report.verdict, Verdict::Pass);
    assert_eq!(outcome.report.counts.passed, outcome.report.counts.total);
    let version = find(&outcome, "cluster-version");
    assert!(version.message.contains(HEALTHY_VERSION), "{}", version.message);
    assert!(outcome.rendered.console.contains("VERDICT: PASS"));
}

#[tokio::test]
async fn test_not_ready_node_fails_pre_upgrade() {
    let outcome = run(
        MockCluster::with_not_ready_worker(),
        ValidationConfig::default(),
        Mode::Pre,
    )
    .await;

    let nodes = find(&outcome, "node-readiness");
    assert_eq!(nodes.status, CheckStatus::Failed);
    assert_eq!(nodes.message, "3/4 nodes Ready; NotReady: worker-0");
    assert_eq!(outcome.report.verdict, Verdict::Fail);
    assert!(outcome.rendered.console.contains("[FAIL] node-readiness"));
}

#[tokio::test]
async fn test_high_memory_warns() {
    let outcome = run(
        MockCluster::healthy().with_memory_peak(92.0),
        ValidationConfig::default(),
        Mode::Pre,
    )
    .await;

    let usage = find(&outcome, "resource-utilization");
    assert_eq!(usage.status, CheckStatus::Warned);
    assert!(usage.message.contains("92.0%"), "{}", usage.message);
    assert!(usage.message.contains("worker-0"), "{}", usage.message);
    assert_eq!(outcome.report.verdict, Verdict::Warn);
}

#[tokio::test]
async fn test_expired_credentials_abort() {
    let cluster = MockCluster::healthy()
        .fail_always(query::CLUSTER_VERSION, ReaderError::Auth("token expired".to_string()));
    let outcome = run(cluster, ValidationConfig::default(), Mode::Pre).await;

    assert_eq!(outcome.report.verdict, Verdict::Fail);
    assert!(outcome.report.is_aborted());
    assert!(outcome.rendered.console.contains("ABORTED:"));
    assert!(outcome
        .rendered
        .log_entries
        .last()
        .unwrap()
        .contains("abort_reason="));
}

#[tokio::test]
async fn test_post_upgrade_checks_target_version() {
    let config = ValidationConfig {
        target_version: Some("4.14.1".to_string()),
        ..Default::default()
    };

    let stale = run(MockCluster::healthy(), config.clone(), Mode::Post).await;
    let version = find(&stale, "cluster-version");
    assert_eq!(version.status, CheckStatus::Failed);
    assert!(version.message.contains("expected 4.14.1"), "{}", version.message);
    assert_eq!(find(&stale, "operator-health").status, CheckStatus::Skipped);
    assert_eq!(stale.report.verdict, Verdict::Fail);

    let upgraded = run(MockCluster::healthy().with_version("4.14.1"), config, Mode::Post).await;
    assert_eq!(upgraded.report.verdict, Verdict::Pass);
}

#[tokio::test]
async fn test_post_failure_warns_when_toggle_disabled() {
    let config = ValidationConfig {
        fail_on_post_check_errors: false,
        ..Default::default()
    };
    let post = run(MockCluster::with_not_ready_worker(), config.clone(), Mode::Post).await;
    assert!(!post.report.fail_on_errors);
    assert_eq!(post.report.verdict, Verdict::Warn);

    // The pre toggle is independent.
    let pre = run(MockCluster::with_not_ready_worker(), config, Mode::Pre).await;
    assert_eq!(pre.report.verdict, Verdict::Fail);
}
