//! Node checks.
//!
//! Node readiness, machine config pool rollout state and CPU/memory
//! utilization against thresholds.

use super::{list_names, EvalContext, Evaluation, Outcome};
use crate::cluster::{ClusterReader, NodeUsage, ReaderError};

/// Every node must report Ready.
pub async fn node_readiness(
    reader: &dyn ClusterReader,
    _ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let nodes = reader.nodes().await?;
    let total = nodes.len();

    if total == 0 {
        return Ok(Evaluation::failed("no nodes reported").observe("nodes", 0usize));
    }

    let not_ready: Vec<&str> = nodes
        .iter()
        .filter(|n| !n.ready)
        .map(|n| n.name.as_str())
        .collect();
    let cordoned: Vec<&str> = nodes
        .iter()
        .filter(|n| n.unschedulable)
        .map(|n| n.name.as_str())
        .collect();
    let ready = total - not_ready.len();

    let eval = if not_ready.is_empty() {
        let mut message = format!("{}/{} nodes Ready", ready, total);
        if !cordoned.is_empty() {
            message.push_str(&format!("; cordoned: {}", list_names(&cordoned)));
        }
        Evaluation::passed(message)
    } else {
        Evaluation::failed(format!(
            "{}/{} nodes Ready; NotReady: {}",
            ready,
            total,
            list_names(&not_ready)
        ))
    };

    Ok(eval
        .observe("nodes", total)
        .observe("ready", ready)
        .observe("unschedulable", cordoned.len()))
}

/// Machine config pools must not be degraded and must have every machine on
/// the current rendered configuration.
pub async fn machine_config_pools(
    reader: &dyn ClusterReader,
    _ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let pools = reader.machine_config_pools().await?;

    if pools.is_empty() {
        return Ok(Evaluation::failed("no machine config pools reported").observe("pools", 0usize));
    }

    let mut problems = Vec::new();
    for pool in &pools {
        if pool.degraded || pool.degraded_machine_count > 0 {
            problems.push(format!(
                "{} degraded ({} degraded machines)",
                pool.name, pool.degraded_machine_count
            ));
        } else if !pool.rollout_complete() {
            problems.push(format!(
                "{} rollout incomplete: {}/{} machines updated",
                pool.name, pool.updated_machine_count, pool.machine_count
            ));
        }
    }

    let updated: u64 = pools.iter().map(|p| p.updated_machine_count as u64).sum();
    let machines: u64 = pools.iter().map(|p| p.machine_count as u64).sum();

    let eval = if problems.is_empty() {
        Evaluation::passed(format!(
            "{} pools fully rolled out ({}/{} machines updated)",
            pools.len(),
            updated,
            machines
        ))
    } else {
        Evaluation::failed(format!("machine config pools not settled: {}", problems.join("; ")))
    };

    Ok(eval
        .observe("pools", pools.len())
        .observe("machines", machines)
        .observe("updated_machines", updated))
}

/// Peak CPU or memory usage across nodes against the percent band.
pub async fn resource_utilization(
    reader: &dyn ClusterReader,
    ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let metrics = reader.resource_metrics().await?;

    let peak_cpu = peak(&metrics.nodes, |n| n.cpu_percent)
        .ok_or_else(|| ReaderError::Query("no node metrics available".to_string()))?;
    let peak_memory = peak(&metrics.nodes, |n| n.memory_percent)
        .ok_or_else(|| ReaderError::Query("no node metrics available".to_string()))?;

    let (resource, node, value) = if peak_memory.1 > peak_cpu.1 {
        ("memory", peak_memory.0, peak_memory.1)
    } else {
        ("cpu", peak_cpu.0, peak_cpu.1)
    };

    let eval = match ctx.thresholds {
        Some(band) => {
            let outcome = Outcome::from(band.classify(value));
            let message = match outcome {
                Outcome::Passed => format!(
                    "peak utilization {:.1}% ({} on {}) below warning threshold {}%",
                    value, resource, node, band.warning
                ),
                Outcome::Warned => format!(
                    "peak utilization {:.1}% ({} on {}) exceeds warning threshold {}%",
                    value, resource, node, band.warning
                ),
                Outcome::Failed => format!(
                    "peak utilization {:.1}% ({} on {}) exceeds critical threshold {}%",
                    value, resource, node, band.critical
                ),
            };
            Evaluation::new(outcome, message)
        }
        None => Evaluation::passed(format!(
            "peak utilization {:.1}% ({} on {})",
            value, resource, node
        )),
    };

    Ok(eval
        .observe("peak_cpu_percent", peak_cpu.1)
        .observe("peak_memory_percent", peak_memory.1)
        .observe("nodes", metrics.nodes.len()))
}

fn peak<F>(nodes: &[NodeUsage], value: F) -> Option<(&str, f64)>
where
    F: Fn(&NodeUsage) -> f64,
{
    nodes
        .iter()
        .map(|n| (n.name.as_str(), value(n)))
        .fold(None::<(&str, f64)>, |best, (name, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((name, v)),
        })
}
