//! Validation sessions.
//!
//! A [`Session`] wires the pipeline together for one invocation: registry,
//! engine, aggregation, rendering, persistence and the completion event.
//! Each run gets its own [`RunContext`]; independent clusters run
//! concurrently on their own tasks with their own readers.

use crate::cluster::ClusterReader;
use crate::config::ValidationConfig;
use crate::engine::cancel::CancelSignal;
use crate::engine::context::{ClusterIdentity, RunContext};
use crate::engine::orchestrator::Orchestrator;
use crate::engine::registry::CheckRegistry;
use crate::engine::result::{aggregate, Report, Verdict};
use crate::events::{EventSink, NullSink, RunCompleted};
use crate::output::store::{PersistedPaths, ReportStore};
use crate::output::{Rendered, Renderer};
use crate::{ConfigError, Mode, PreflightError};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Which runs an invocation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModeSelection {
    #[default]
    Pre,
    Post,
    /// Pre run, wait, then post run
    Both,
}

/// A cluster and the reader used to inspect it.
#[derive(Clone)]
pub struct ClusterTarget {
    pub identity: ClusterIdentity,
    pub reader: Arc<dyn ClusterReader>,
}

impl ClusterTarget {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        reader: Arc<dyn ClusterReader>,
    ) -> Self {
        ClusterTarget {
            identity: ClusterIdentity::new(name, endpoint),
            reader,
        }
    }
}

impl fmt::Debug for ClusterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterTarget")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// What happened to a run's artifacts.
#[derive(Debug)]
pub enum StorageOutcome {
    /// No output directory configured
    NotConfigured,
    Written(PersistedPaths),
    /// Writing failed; the report itself is still valid
    Failed(PreflightError),
}

/// Report, rendered output and storage result of one run.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub rendered: Rendered,
    pub storage: StorageOutcome,
}

impl RunOutcome {
    pub fn storage_failed(&self) -> bool {
        matches!(self.storage, StorageOutcome::Failed(_))
    }
}

/// One invocation's pipeline.
#[derive(Clone)]
pub struct Session {
    config: Arc<ValidationConfig>,
    registry: Arc<CheckRegistry>,
    renderer: Renderer,
    store: Option<ReportStore>,
    sink: Arc<dyn EventSink>,
    cancel: CancelSignal,
}

impl Session {
    /// Validate the configuration and build the standard registry. Fails
    /// before anything runs if either is invalid.
    pub fn new(config: ValidationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = CheckRegistry::standard(&config)?;
        Ok(Session {
            config: Arc::new(config),
            registry: Arc::new(registry),
            renderer: Renderer::default(),
            store: None,
            sink: Arc::new(NullSink),
            cancel: CancelSignal::never(),
        })
    }

    /// Replace the standard registry.
    pub fn with_registry(mut self, registry: CheckRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_store(mut self, store: ReportStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.cancel = signal;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Run one mode against one cluster: execute, aggregate, render,
    /// persist and publish. Always yields a report.
    pub async fn run_mode(&self, target: &ClusterTarget, mode: Mode) -> RunOutcome {
        let ctx = RunContext::new(target.identity.clone(), mode, Arc::clone(&self.config));
        let run = Orchestrator::new(Arc::clone(&target.reader))
            .with_cancellation(self.cancel.clone())
            .run(ctx, &self.registry)
            .await;

        let report = aggregate(&run);
        let rendered = self.renderer.render(&report);
        info!(
            run_id = %report.run_id,
            cluster = %report.cluster.name,
            mode = %report.mode,
            verdict = %report.verdict,
            "run verdict"
        );

        let storage = match &self.store {
            None => StorageOutcome::NotConfigured,
            Some(store) => match store.persist(&report, &rendered).await {
                Ok(paths) => StorageOutcome::Written(paths),
                Err(e) => StorageOutcome::Failed(e),
            },
        };

        let (document_path, log_path) = match &storage {
            StorageOutcome::Written(paths) => {
                (Some(paths.document.clone()), Some(paths.log.clone()))
            }
            _ => (None, None),
        };
        self.sink
            .publish(RunCompleted {
                report: report.clone(),
                document_path,
                log_path,
            })
            .await;

        RunOutcome {
            report,
            rendered,
            storage,
        }
    }

    /// Run the selected modes against one cluster. In `Both`, the post run
    /// follows after `post_upgrade_wait_time`, unless the pre run failed or
    /// the session was cancelled.
    pub async fn run_invocation(
        &self,
        target: &ClusterTarget,
        selection: ModeSelection,
    ) -> Vec<RunOutcome> {
        match selection {
            ModeSelection::Pre => vec![self.run_mode(target, Mode::Pre).await],
            ModeSelection::Post => vec![self.run_mode(target, Mode::Post).await],
            ModeSelection::Both => {
                let pre = self.run_mode(target, Mode::Pre).await;
                if pre.report.verdict == Verdict::Fail {
                    warn!(
                        cluster = %target.identity.name,
                        "pre-upgrade verdict FAIL; post-upgrade checks not run"
                    );
                    return vec![pre];
                }

                let wait = self.config.post_upgrade_wait();
                if !wait.is_zero() {
                    info!(
                        cluster = %target.identity.name,
                        wait_secs = wait.as_secs(),
                        "waiting before post-upgrade checks"
                    );
                }
                if self.cancel.sleep(wait).await {
                    info!(cluster = %target.identity.name, "cancelled before post-upgrade checks");
                    return vec![pre];
                }

                let post = self.run_mode(target, Mode::Post).await;
                vec![pre, post]
            }
        }
    }

    /// Validate several clusters concurrently. Results come back in input
    /// order; a cluster whose task died yields [`PreflightError::Task`].
    pub async fn run_clusters(
        &self,
        targets: Vec<ClusterTarget>,
        selection: ModeSelection,
    ) -> Vec<Result<Vec<RunOutcome>, PreflightError>> {
        let names: Vec<String> = targets.iter().map(|t| t.identity.name.clone()).collect();
        let mut slots: Vec<Option<Vec<RunOutcome>>> = names.iter().map(|_| None).collect();
        let mut failures = Vec::new();

        let mut set = JoinSet::new();
        for (index, target) in targets.into_iter().enumerate() {
            let session = self.clone();
            set.spawn(async move {
                let outcomes = session.run_invocation(&target, selection).await;
                (index, outcomes)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcomes)) => slots[index] = Some(outcomes),
                Err(e) => failures.push(e.to_string()),
            }
        }

        let message = if failures.is_empty() {
            "task ended without a result".to_string()
        } else {
            failures.join("; ")
        };
        slots
            .into_iter()
            .zip(names)
            .map(|(slot, cluster)| {
                slot.ok_or_else(|| PreflightError::Task {
                    cluster,
                    message: message.clone(),
                })
            })
            .collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("renderer", &self.renderer)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
