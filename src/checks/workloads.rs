//! Workload checks.
//!
//! Pod health in critical namespaces and detection of operations stuck in
//! Pending or Terminating.

use super::{list_names, EvalContext, Evaluation, Outcome};
use crate::cluster::{ClusterReader, PodInfo, PodPhase, ReaderError};
use std::collections::BTreeSet;

/// Pods in the configured critical namespaces must be Running and ready (or
/// Succeeded, for completed jobs).
pub async fn critical_pods(
    reader: &dyn ClusterReader,
    ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let namespaces = &ctx.config.critical_namespaces;
    let pods = reader.pods(namespaces).await?;

    if pods.is_empty() {
        return Ok(Evaluation::failed(format!(
            "no pods found in {} critical namespaces",
            namespaces.len()
        ))
        .observe("pods", 0usize));
    }

    let unhealthy: Vec<String> = pods
        .iter()
        .filter(|p| !pod_healthy(p))
        .map(|p| format!("{} ({})", p.qualified_name(), pod_state(p)))
        .collect();
    let seen: BTreeSet<&str> = pods.iter().map(|p| p.namespace.as_str()).collect();

    let eval = if unhealthy.is_empty() {
        Evaluation::passed(format!(
            "{} pods healthy across {} critical namespaces",
            pods.len(),
            seen.len()
        ))
    } else {
        Evaluation::failed(format!(
            "{}/{} pods unhealthy in critical namespaces: {}",
            unhealthy.len(),
            pods.len(),
            list_names(&unhealthy)
        ))
    };

    Ok(eval
        .observe("pods", pods.len())
        .observe("unhealthy", unhealthy.len())
        .observe("namespaces", seen.len()))
}

/// Pods that have sat in Pending or Terminating longer than the configured
/// age, counted against the band.
pub async fn stuck_operations(
    reader: &dyn ClusterReader,
    ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let pods = reader.pods(&[]).await?;
    let stuck_after = ctx.config.stuck_after();

    let stuck: Vec<String> = pods
        .iter()
        .filter(|p| (p.terminating || p.phase == PodPhase::Pending) && p.age_secs >= stuck_after.as_secs())
        .map(|p| {
            let state = if p.terminating { "Terminating" } else { "Pending" };
            format!("{} ({} {}m)", p.qualified_name(), state, p.age_secs / 60)
        })
        .collect();
    let count = stuck.len();
    let minutes = stuck_after.as_secs() / 60;

    let eval = match ctx.thresholds {
        Some(band) => match Outcome::from(band.classify(count as f64)) {
            Outcome::Passed => Evaluation::passed(format!(
                "no pods stuck longer than {}m ({} pods inspected)",
                minutes,
                pods.len()
            )),
            outcome => Evaluation::new(
                outcome,
                format!(
                    "{} pods stuck longer than {}m: {}",
                    count,
                    minutes,
                    list_names(&stuck)
                ),
            ),
        },
        None if count == 0 => Evaluation::passed(format!(
            "no pods stuck longer than {}m ({} pods inspected)",
            minutes,
            pods.len()
        )),
        None => Evaluation::failed(format!(
            "{} pods stuck longer than {}m: {}",
            count,
            minutes,
            list_names(&stuck)
        )),
    };

    Ok(eval.observe("stuck", count).observe("pods", pods.len()))
}

fn pod_healthy(pod: &PodInfo) -> bool {
    match pod.phase {
        PodPhase::Succeeded => true,
        PodPhase::Running => pod.ready && !pod.terminating,
        PodPhase::Pending | PodPhase::Failed | PodPhase::Unknown => false,
    }
}

fn pod_state(pod: &PodInfo) -> &'static str {
    if pod.terminating {
        return "Terminating";
    }
    match pod.phase {
        PodPhase::Running => "NotReady",
        PodPhase::Pending => "Pending",
        PodPhase::Failed => "Failed",
        PodPhase::Unknown => "Unknown",
        PodPhase::Succeeded => "Succeeded",
    }
}
