//! Control plane checks.
//!
//! API responsiveness, cluster version and update state, etcd quorum and
//! cluster operator health.

use super::{list_names, EvalContext, Evaluation, Outcome};
use crate::cluster::{ClusterReader, ReaderError};
use crate::Mode;

/// API round-trip latency against the configured band (milliseconds).
pub async fn api_responsiveness(
    reader: &dyn ClusterReader,
    ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let probe = reader.probe_api().await?;

    if !probe.healthy {
        return Ok(Evaluation::failed(format!(
            "API server reports unhealthy (responded in {}ms)",
            probe.latency_ms
        ))
        .observe("latency_ms", probe.latency_ms)
        .observe("healthy", false));
    }

    let latency = probe.latency_ms as f64;
    let eval = match ctx.thresholds {
        Some(band) => {
            let outcome = Outcome::from(band.classify(latency));
            let message = match outcome {
                Outcome::Passed => format!("API responded in {}ms", probe.latency_ms),
                Outcome::Warned => format!(
                    "API latency {}ms exceeds warning threshold {}ms",
                    probe.latency_ms, band.warning
                ),
                Outcome::Failed => format!(
                    "API latency {}ms exceeds critical threshold {}ms",
                    probe.latency_ms, band.critical
                ),
            };
            Evaluation::new(outcome, message)
        }
        None => Evaluation::passed(format!("API responded in {}ms", probe.latency_ms)),
    };

    Ok(eval
        .observe("latency_ms", probe.latency_ms)
        .observe("healthy", true))
}

/// Version, channel and update progress.
///
/// Before an upgrade no update may already be in flight; after it the
/// update must have settled, optionally on the configured target version.
pub async fn cluster_version(
    reader: &dyn ClusterReader,
    ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let info = reader.cluster_version().await?;

    let observe = |eval: Evaluation| {
        eval.observe("version", info.version.as_str())
            .observe("channel", info.channel.as_str())
            .observe("progressing", info.progressing)
    };

    if let Some(ref failing) = info.failing {
        return Ok(observe(Evaluation::failed(format!(
            "cluster version {} reports Failing: {}",
            info.version, failing
        ))));
    }

    match ctx.mode {
        Mode::Pre => {
            if info.has_pending_update() {
                let desired = info.desired_version.as_deref().unwrap_or("unknown");
                return Ok(observe(Evaluation::failed(format!(
                    "update from {} to {} already in progress",
                    info.version, desired
                ))));
            }
            if info.channel.trim().is_empty() {
                return Ok(observe(Evaluation::failed(format!(
                    "cluster version {} has no update channel set",
                    info.version
                ))));
            }
        }
        Mode::Post => {
            if info.has_pending_update() {
                let desired = info.desired_version.as_deref().unwrap_or("unknown");
                return Ok(observe(Evaluation::failed(format!(
                    "update to {} still progressing (current {})",
                    desired, info.version
                ))));
            }
            if let Some(ref target) = ctx.config.target_version {
                if &info.version != target {
                    return Ok(observe(Evaluation::failed(format!(
                        "cluster reports version {}, expected {}",
                        info.version, target
                    ))));
                }
            }
        }
    }

    let updates = match info.available_updates.len() {
        0 => "no updates available".to_string(),
        1 => "1 update available".to_string(),
        n => format!("{} updates available", n),
    };
    Ok(observe(Evaluation::passed(format!(
        "cluster version {} on channel {}, no update in progress ({})",
        info.version, info.channel, updates
    ))))
}

/// Quorum, leader and per-member health of etcd.
pub async fn etcd_health(
    reader: &dyn ClusterReader,
    _ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let status = reader.etcd_status().await?;
    let total = status.members.len();
    let healthy = status.healthy_members();

    let unhealthy: Vec<&str> = status
        .members
        .iter()
        .filter(|m| !(m.healthy && m.pod_ready))
        .map(|m| m.name.as_str())
        .collect();

    let eval = if total == 0 {
        Evaluation::failed("no etcd members reported")
    } else if !status.has_quorum() {
        Evaluation::failed(format!(
            "etcd quorum lost: {}/{} members healthy (unhealthy: {})",
            healthy,
            total,
            list_names(&unhealthy)
        ))
    } else if !status.has_leader {
        Evaluation::failed(format!(
            "etcd has no elected leader ({}/{} members healthy)",
            healthy, total
        ))
    } else if !unhealthy.is_empty() {
        Evaluation::failed(format!(
            "etcd quorum intact ({}/{}) but members unhealthy: {}",
            healthy,
            total,
            list_names(&unhealthy)
        ))
    } else {
        Evaluation::passed(format!("all {} etcd members healthy, leader elected", total))
    };

    Ok(eval
        .observe("members", total)
        .observe("healthy_members", healthy)
        .observe("has_leader", status.has_leader))
}

/// Degraded, unavailable and (after an upgrade) still-progressing operators.
pub async fn operator_health(
    reader: &dyn ClusterReader,
    ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let operators = reader.operators().await?;
    let total = operators.len();

    if total == 0 {
        return Ok(
            Evaluation::failed("no cluster operators reported").observe("operators", 0usize),
        );
    }

    let degraded: Vec<&str> = operators
        .iter()
        .filter(|o| o.degraded)
        .map(|o| o.name.as_str())
        .collect();
    let unavailable: Vec<&str> = operators
        .iter()
        .filter(|o| !o.available)
        .map(|o| o.name.as_str())
        .collect();
    let progressing: Vec<&str> = operators
        .iter()
        .filter(|o| o.progressing)
        .map(|o| o.name.as_str())
        .collect();
    let off_target: Vec<&str> = match (ctx.mode, ctx.config.target_version.as_deref()) {
        (Mode::Post, Some(target)) => operators
            .iter()
            .filter(|o| o.version.as_deref().is_some_and(|v| v != target))
            .map(|o| o.name.as_str())
            .collect(),
        _ => Vec::new(),
    };

    let mut problems = Vec::new();
    if !degraded.is_empty() {
        problems.push(format!("degraded: {}", list_names(&degraded)));
    }
    if !unavailable.is_empty() {
        problems.push(format!("unavailable: {}", list_names(&unavailable)));
    }
    if ctx.mode == Mode::Post && !progressing.is_empty() {
        problems.push(format!("still progressing: {}", list_names(&progressing)));
    }
    if !off_target.is_empty() {
        problems.push(format!("not at target version: {}", list_names(&off_target)));
    }

    let eval = if problems.is_empty() {
        let mut message = format!("all {} cluster operators available and not degraded", total);
        if !progressing.is_empty() {
            message.push_str(&format!(
                " ({} progressing: {})",
                progressing.len(),
                list_names(&progressing)
            ));
        }
        Evaluation::passed(message)
    } else {
        Evaluation::failed(format!(
            "cluster operators unhealthy ({} total); {}",
            total,
            problems.join("; ")
        ))
    };

    Ok(eval
        .observe("operators", total)
        .observe("degraded", degraded.len())
        .observe("unavailable", unavailable.len())
        .observe("progressing", progressing.len()))
}
