//! CLI integration tests.
//!
//! Argument parsing, configuration loading and target resolution from
//! snapshot files.

use crate::mocks::MockCluster;
use clap::Parser;
use std::path::Path;
use upgrade_preflight::cli::args::{CheckArgs, Cli, Command};
use upgrade_preflight::cli::build_targets;
use upgrade_preflight::output::DocumentFormat;
use upgrade_preflight::session::{ModeSelection, Session};
use upgrade_preflight::{CheckCategory, ConfigError, Mode, PreflightError, Verdict};

fn parse_check(args: &[&str]) -> CheckArgs {
    let argv = std::iter::once("upgrade-preflight").chain(args.iter().copied());
    match Cli::try_parse_from(argv).unwrap().into_command() {
        Command::Check(args) => args,
        other => panic!("expected check command, got {:?}", other),
    }
}

fn write_snapshot(dir: &Path, name: &str, cluster: &MockCluster) -> std::path::PathBuf {
    let path = dir.join(format!("{}.yaml", name));
    std::fs::write(&path, serde_yaml::to_string(&cluster.state).unwrap()).unwrap();
    path
}

#[test]
fn test_default_args() {
    let args = parse_check(&[]);
    assert_eq!(args.mode, ModeSelection::Pre);
    assert_eq!(args.format, DocumentFormat::Json);
    assert!(args.category.is_empty());
    assert!(!args.quiet);
    assert!(!args.verbose);
    assert!(!args.fail_fast);
    assert_eq!(args.timeout, None);
}

#[test]
fn test_check_flags() {
    let args = parse_check(&[
        "check",
        "--mode",
        "post",
        "--cluster",
        "prod-east",
        "--target-version",
        "4.14.1",
        "--timeout",
        "15",
        "--fail-fast",
        "--quiet",
        "--log-json",
        "--event-file",
        "events.jsonl",
    ]);
    assert_eq!(args.mode, ModeSelection::Post);
    assert_eq!(args.cluster.as_deref(), Some("prod-east"));
    assert_eq!(args.target_version.as_deref(), Some("4.14.1"));
    assert_eq!(args.timeout, Some(15));
    assert!(args.fail_fast);
    assert!(args.quiet);
    assert!(args.log_json);
    assert_eq!(args.event_file.as_deref(), Some(Path::new("events.jsonl")));
}

#[cfg(feature = "junit")]
#[test]
fn test_junit_format() {
    let args = parse_check(&["--format", "junit"]);
    assert_eq!(args.format, DocumentFormat::Junit);
}

#[test]
fn test_invalid_values_rejected() {
    for argv in [
        vec!["upgrade-preflight", "--category", "gpu"],
        vec!["upgrade-preflight", "--timeout", "soon"],
        vec!["upgrade-preflight", "--format", "yaml"],
    ] {
        assert!(Cli::try_parse_from(argv.clone()).is_err(), "{:?}", argv);
    }
}

#[test]
fn test_config_file_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("preflight.yaml");
    std::fs::write(
        &config_path,
        "fail_on_post_check_errors: false\ncategories: [nodes]\nmax_attempts: 2\n",
    )
    .unwrap();

    let config_arg = config_path.to_string_lossy().to_string();
    let args = parse_check(&["--config", &config_arg, "--category", "storage", "--timeout", "9"]);
    let config = args.load_config().unwrap();

    assert!(!config.fail_on_post_check_errors);
    assert_eq!(config.categories, vec![CheckCategory::Storage]);
    assert_eq!(config.max_attempts, 2);
    assert_eq!(config.check_timeout_secs, 9);
}

#[test]
fn test_broken_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("broken.yaml");
    std::fs::write(&config_path, "max_attempts: [not, a, number]\n").unwrap();

    let config_arg = config_path.to_string_lossy().to_string();
    let err = parse_check(&["--config", &config_arg])
        .load_config()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[tokio::test]
async fn test_snapshot_target_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path(), "lab-cluster", &MockCluster::healthy());
    let snapshot_arg = snapshot.to_string_lossy().to_string();

    let args = parse_check(&["--snapshot", &snapshot_arg]);
    let config = args.load_config().unwrap();
    let targets = build_targets(&args, &config).unwrap();

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].identity.name, "lab-cluster");
    assert_eq!(targets[0].identity.endpoint, "https://api.mock.example:6443");

    let outcome = Session::new(config)
        .unwrap()
        .run_mode(&targets[0], Mode::Pre)
        .await;
    assert_eq!(outcome.report.verdict, Verdict::Pass);
}

#[test]
fn test_clusters_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let east = write_snapshot(dir.path(), "east", &MockCluster::healthy());
    let west = write_snapshot(dir.path(), "west", &MockCluster::with_not_ready_worker());
    let config_path = dir.path().join("preflight.yaml");
    std::fs::write(
        &config_path,
        format!(
            "clusters:\n  - name: east\n    endpoint: https://api.east:6443\n    snapshot: {}\n  - name: west\n    snapshot: {}\n",
            east.display(),
            west.display()
        ),
    )
    .unwrap();

    let config_arg = config_path.to_string_lossy().to_string();
    let args = parse_check(&["--config", &config_arg]);
    let config = args.load_config().unwrap();
    let targets = build_targets(&args, &config).unwrap();
    let names: Vec<&str> = targets.iter().map(|t| t.identity.name.as_str()).collect();
    assert_eq!(names, vec!["east", "west"]);
    assert_eq!(targets[0].identity.endpoint, "https://api.east:6443");
    assert_eq!(targets[1].identity.endpoint, "https://api.mock.example:6443");

    let only_west = parse_check(&["--config", &config_arg, "--cluster", "west"]);
    let targets = build_targets(&only_west, &config).unwrap();
    assert_eq!(targets.len(), 1);

    let unknown = parse_check(&["--config", &config_arg, "--cluster", "south"]);
    assert!(matches!(
        build_targets(&unknown, &config),
        Err(PreflightError::Config(ConfigError::NoTargets))
    ));
}
