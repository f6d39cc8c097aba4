//! Network checks.

use super::{list_names, EvalContext, Evaluation};
use crate::cluster::{ClusterReader, ReaderError};

/// Ingress controllers must be available and not degraded, and cluster DNS
/// must report Available.
pub async fn ingress_dns(
    reader: &dyn ClusterReader,
    _ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let status = reader.ingress_status().await?;

    let mut problems = Vec::new();
    if status.controllers.is_empty() {
        problems.push("no ingress controllers reported".to_string());
    }
    let unavailable: Vec<&str> = status
        .controllers
        .iter()
        .filter(|c| !c.available)
        .map(|c| c.name.as_str())
        .collect();
    if !unavailable.is_empty() {
        problems.push(format!("unavailable: {}", list_names(&unavailable)));
    }
    let degraded: Vec<&str> = status
        .controllers
        .iter()
        .filter(|c| c.degraded)
        .map(|c| c.name.as_str())
        .collect();
    if !degraded.is_empty() {
        problems.push(format!("degraded: {}", list_names(&degraded)));
    }
    if !status.dns_available {
        problems.push("cluster DNS not available".to_string());
    }

    let eval = if problems.is_empty() {
        Evaluation::passed(format!(
            "{} ingress controllers available, cluster DNS available",
            status.controllers.len()
        ))
    } else {
        Evaluation::failed(problems.join("; "))
    };

    Ok(eval
        .observe("controllers", status.controllers.len())
        .observe("dns_available", status.dns_available))
}
