//! Check execution orchestrator.
//!
//! Drives a mode's registry to completion against one [`ClusterReader`].
//!
//! # Execution Rules
//!
//! Checks run strictly one after another in registry order. For each check:
//! - Cancellation requested: the check and all later ones are Skipped
//!   ("run cancelled")
//! - Run aborted: Skipped ("run aborted")
//! - A dependency Failed, Errored or was Skipped: Skipped ("dependency unmet")
//! - Otherwise evaluated, each attempt bounded by the check's timeout
//!
//! Timeouts, query errors and transient connectivity errors are retried with
//! capped exponential backoff; once attempts run out the check is Errored.
//! Cancellation during a backoff sleep records the check Skipped ("run
//! cancelled") with the attempts it made.
//! Endpoint-level connectivity and authentication errors abort the run.
//! A panicking evaluation is Errored, never retried, and does not take the
//! run down with it.
//!
//! Every check ends with exactly one result, so the frozen run always covers
//! the whole registry.

use crate::checks::{EvalContext, Evaluation, Outcome};
use crate::cluster::{ClusterReader, ReaderError};
use crate::engine::cancel::CancelSignal;
use crate::engine::context::{CheckResult, CheckStatus, CompletedRun, RunContext, SkipReason};
use crate::engine::registry::{CheckDefinition, CheckRegistry};
use crate::Severity;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sequential check executor bound to one cluster reader.
pub struct Orchestrator {
    reader: Arc<dyn ClusterReader>,
    cancel: CancelSignal,
}

/// Why a single attempt produced no evaluation.
enum AttemptFailure {
    Reader(ReaderError),
    Crashed(String),
}

/// A check's recorded result plus the interruption it triggered, if any.
struct Execution {
    result: CheckResult,
    abort: Option<String>,
    cancelled: bool,
}

impl Execution {
    fn finished(result: CheckResult, abort: Option<String>) -> Self {
        Execution {
            result,
            abort,
            cancelled: false,
        }
    }
}

impl Orchestrator {
    pub fn new(reader: Arc<dyn ClusterReader>) -> Self {
        Orchestrator {
            reader,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.cancel = signal;
        self
    }

    /// Run every check of the context's mode and freeze the context.
    pub async fn run(&self, mut ctx: RunContext, registry: &CheckRegistry) -> CompletedRun {
        let definitions = registry.definitions(ctx.mode());
        info!(
            run_id = %ctx.run_id(),
            cluster = %ctx.cluster().name,
            mode = %ctx.mode(),
            checks = definitions.len(),
            "starting run"
        );

        for def in definitions {
            if ctx.interruption().is_none() && self.cancel.is_cancelled() {
                info!(run_id = %ctx.run_id(), next_check = %def.id, "run cancelled; skipping remaining checks");
                ctx.cancel();
            }
            if let Some(reason) = interruption_skip(&ctx) {
                ctx.record(CheckResult::skipped(def, reason, Utc::now()));
                continue;
            }
            if let Some(dependency) = unmet_dependency(&ctx, def) {
                debug!(check = %def.id, dependency = %dependency, "dependency unmet; skipping");
                ctx.record(CheckResult::skipped(
                    def,
                    SkipReason::DependencyUnmet { dependency },
                    Utc::now(),
                ));
                continue;
            }

            info!(check = %def.id, severity = %def.severity, "running check");
            let execution = self.execute(def, &ctx).await;
            info!(
                check = %def.id,
                status = %execution.result.status,
                attempts = execution.result.attempts,
                "check finished"
            );
            ctx.record(execution.result);

            if let Some(reason) = execution.abort {
                error!(run_id = %ctx.run_id(), reason = %reason, "aborting run");
                ctx.abort(reason);
            } else if execution.cancelled {
                info!(
                    run_id = %ctx.run_id(),
                    check = %def.id,
                    "run cancelled during retry backoff"
                );
                ctx.cancel();
            }
        }

        let run = ctx.freeze(Utc::now());
        info!(
            run_id = %run.run_id(),
            results = run.results().len(),
            aborted = run.abort_reason().is_some(),
            cancelled = run.cancelled(),
            "run complete"
        );
        run
    }

    /// Evaluate one check with retry, returning its final result.
    async fn execute(&self, def: &CheckDefinition, ctx: &RunContext) -> Execution {
        let started_at = Utc::now();
        let eval_ctx = EvalContext {
            mode: def.mode,
            thresholds: def.thresholds,
            config: Arc::clone(ctx.config()),
        };
        let max_attempts = def.retry.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.attempt(def, &eval_ctx).await {
                Ok(eval) => {
                    let status = match eval.outcome {
                        Outcome::Passed => CheckStatus::Passed,
                        Outcome::Warned => CheckStatus::Warned,
                        Outcome::Failed => CheckStatus::Failed,
                    };
                    let result = CheckResult::executed(
                        def,
                        status,
                        attempt,
                        eval.message,
                        started_at,
                        Utc::now(),
                    )
                    .with_observed(eval.observed);
                    let abort = fail_fast_reason(def, &result, ctx);
                    return Execution::finished(result, abort);
                }
                Err(AttemptFailure::Crashed(message)) => {
                    error!(check = %def.id, attempt, "{}", message);
                    let result = CheckResult::executed(
                        def,
                        CheckStatus::Errored,
                        attempt,
                        message,
                        started_at,
                        Utc::now(),
                    );
                    let abort = fail_fast_reason(def, &result, ctx);
                    return Execution::finished(result, abort);
                }
                Err(AttemptFailure::Reader(err)) => err,
            };

            if err.aborts_run() {
                error!(check = %def.id, attempt, error = %err, "cluster endpoint unusable");
                let result = CheckResult::executed(
                    def,
                    CheckStatus::Errored,
                    attempt,
                    err.to_string(),
                    started_at,
                    Utc::now(),
                );
                return Execution::finished(
                    result,
                    Some(format!("{} (while running '{}')", err, def.id)),
                );
            }

            if err.is_retryable() && attempt < max_attempts {
                let backoff = def.retry.backoff_for(attempt);
                warn!(
                    check = %def.id,
                    attempt,
                    max_attempts,
                    error = %err,
                    error_kind = err.kind(),
                    backoff_ms = backoff.as_millis() as u64,
                    "attempt failed; retrying"
                );
                if self.cancel.sleep(backoff).await {
                    let mut result =
                        CheckResult::skipped(def, SkipReason::RunCancelled, Utc::now());
                    result.attempts = attempt;
                    result.started_at = started_at;
                    result.message = format!("run cancelled before retry (last error: {})", err);
                    return Execution {
                        result,
                        abort: None,
                        cancelled: true,
                    };
                }
                continue;
            }

            warn!(
                check = %def.id,
                attempt,
                max_attempts,
                error = %err,
                error_kind = err.kind(),
                "attempt failed; giving up"
            );
            let message = if attempt > 1 {
                format!("{} (after {} attempts)", err, attempt)
            } else {
                err.to_string()
            };
            let result = CheckResult::executed(
                def,
                CheckStatus::Errored,
                attempt,
                message,
                started_at,
                Utc::now(),
            );
            let abort = fail_fast_reason(def, &result, ctx);
            return Execution::finished(result, abort);
        }
    }

    /// One evaluate call on its own task, bounded by the check's timeout.
    async fn attempt(
        &self,
        def: &CheckDefinition,
        eval_ctx: &EvalContext,
    ) -> Result<Evaluation, AttemptFailure> {
        let reader = Arc::clone(&self.reader);
        let kind = def.kind;
        let eval_ctx = eval_ctx.clone();
        let mut handle =
            tokio::spawn(async move { kind.evaluate(reader.as_ref(), &eval_ctx).await });

        match tokio::time::timeout(def.timeout, &mut handle).await {
            Ok(Ok(result)) => result.map_err(AttemptFailure::Reader),
            Ok(Err(join_err)) if join_err.is_panic() => Err(AttemptFailure::Crashed(
                "check panicked during evaluation".to_string(),
            )),
            Ok(Err(_)) => Err(AttemptFailure::Crashed(
                "check evaluation task was cancelled".to_string(),
            )),
            Err(_) => {
                handle.abort();
                Err(AttemptFailure::Reader(ReaderError::Timeout(def.timeout)))
            }
        }
    }
}

fn interruption_skip(ctx: &RunContext) -> Option<SkipReason> {
    use crate::engine::context::RunInterruption;

    match ctx.interruption()? {
        RunInterruption::Aborted { .. } => Some(SkipReason::RunAborted),
        RunInterruption::Cancelled => Some(SkipReason::RunCancelled),
    }
}

/// First dependency without a usable result. Warned counts as usable.
fn unmet_dependency(ctx: &RunContext, def: &CheckDefinition) -> Option<String> {
    def.depends_on
        .iter()
        .find(|dep| match ctx.result(dep) {
            Some(result) => matches!(
                result.status,
                CheckStatus::Failed | CheckStatus::Errored | CheckStatus::Skipped
            ),
            None => true,
        })
        .cloned()
}

/// With `abort_on_critical_failure`, a critical failure that would fail the
/// verdict stops the run.
fn fail_fast_reason(def: &CheckDefinition, result: &CheckResult, ctx: &RunContext) -> Option<String> {
    let config = ctx.config();
    let verdict_failing = def.severity == Severity::Critical
        && result.status.is_failure()
        && config.fail_on_errors(ctx.mode());
    if config.abort_on_critical_failure && verdict_failing {
        Some(format!(
            "critical check '{}' {}: {}",
            def.id, result.status, result.message
        ))
    } else {
        None
    }
}
