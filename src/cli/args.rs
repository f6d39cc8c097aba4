//! Command line arguments.
//!
//! `check` is the default command: running the binary with only check
//! flags behaves like `upgrade-preflight check ...`.

use crate::config::ValidationConfig;
use crate::output::DocumentFormat;
use crate::session::ModeSelection;
use crate::{CheckCategory, ConfigError, Mode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Cluster health validation before and after an upgrade
#[derive(Parser, Debug)]
#[command(name = "upgrade-preflight")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub check: CheckArgs,
}

impl Cli {
    /// The command to run, defaulting to `check`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Check(self.check))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run validation checks (default)
    Check(CheckArgs),

    /// List the checks a run would execute
    List(ListArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Which side of the upgrade to validate
    #[arg(long, value_enum, default_value_t = ModeSelection::Pre)]
    pub mode: ModeSelection,

    /// Cluster name used in reports (defaults to the snapshot file name)
    #[arg(long)]
    pub cluster: Option<String>,

    /// API endpoint recorded in reports
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Cluster snapshot to validate (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Configuration file (YAML)
    #[arg(long, value_name = "FILE", env = "UPGRADE_PREFLIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only run checks in this category (repeatable)
    #[arg(long, value_enum)]
    pub category: Vec<CheckCategory>,

    /// Skip a check by id (repeatable)
    #[arg(long, value_name = "ID")]
    pub skip: Vec<String>,

    /// Directory for logs and report documents
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report document format
    #[arg(long, value_enum, default_value_t = DocumentFormat::Json)]
    pub format: DocumentFormat,

    /// Expected cluster version after the upgrade
    #[arg(long)]
    pub target_version: Option<String>,

    /// Seconds to wait between pre and post runs in `both` mode
    #[arg(long, value_name = "SECS")]
    pub post_upgrade_wait: Option<u64>,

    /// Per-attempt check timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Abort the run on the first failing critical check
    #[arg(long)]
    pub fail_fast: bool,

    /// Do not fail pre-upgrade runs on critical check failures
    #[arg(long)]
    pub no_fail_on_pre_errors: bool,

    /// Do not fail post-upgrade runs on critical check failures
    #[arg(long)]
    pub no_fail_on_post_errors: bool,

    /// Append the RunCompleted event to this file as a JSON line
    #[arg(long, value_name = "FILE")]
    pub event_file: Option<PathBuf>,

    /// Only show checks that did not pass
    #[arg(short, long)]
    pub quiet: bool,

    /// Show attempts and timings, and debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Emit diagnostics as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl CheckArgs {
    /// Configuration file (or defaults) with command line overrides applied.
    pub fn load_config(&self) -> Result<ValidationConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ValidationConfig::from_file(path)?,
            None => ValidationConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut ValidationConfig) {
        if !self.category.is_empty() {
            config.categories = self.category.clone();
        }
        config.skip_checks.extend(self.skip.iter().cloned());
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(version) = &self.target_version {
            config.target_version = Some(version.clone());
        }
        if let Some(wait) = self.post_upgrade_wait {
            config.post_upgrade_wait_time = wait;
        }
        if let Some(timeout) = self.timeout {
            config.check_timeout_secs = timeout;
        }
        if self.fail_fast {
            config.abort_on_critical_failure = true;
        }
        if self.no_fail_on_pre_errors {
            config.fail_on_pre_check_errors = false;
        }
        if self.no_fail_on_post_errors {
            config.fail_on_post_check_errors = false;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Mode whose checks to list
    #[arg(long, value_enum, default_value_t = Mode::Pre)]
    pub mode: Mode,

    /// Configuration file (YAML)
    #[arg(long, value_name = "FILE", env = "UPGRADE_PREFLIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only list checks in this category (repeatable)
    #[arg(long, value_enum)]
    pub category: Vec<CheckCategory>,
}
