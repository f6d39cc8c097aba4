//! Storage checks.

use super::{list_names, EvalContext, Evaluation};
use crate::cluster::{ClusterReader, ReaderError, VolumePhase};

/// No persistent volume may be in the Failed or Pending phase.
pub async fn persistent_volumes(
    reader: &dyn ClusterReader,
    _ctx: &EvalContext,
) -> Result<Evaluation, ReaderError> {
    let volumes = reader.persistent_volumes().await?;

    let failed: Vec<&str> = volumes
        .iter()
        .filter(|v| v.phase == VolumePhase::Failed)
        .map(|v| v.name.as_str())
        .collect();
    let pending: Vec<&str> = volumes
        .iter()
        .filter(|v| v.phase == VolumePhase::Pending)
        .map(|v| v.name.as_str())
        .collect();
    let bound = volumes.iter().filter(|v| v.phase == VolumePhase::Bound).count();
    let released = volumes
        .iter()
        .filter(|v| v.phase == VolumePhase::Released)
        .count();

    let eval = if failed.is_empty() && pending.is_empty() {
        Evaluation::passed(format!(
            "{} volumes healthy ({} bound, {} released)",
            volumes.len(),
            bound,
            released
        ))
    } else {
        let mut parts = Vec::new();
        if !failed.is_empty() {
            parts.push(format!("{} Failed: {}", failed.len(), list_names(&failed)));
        }
        if !pending.is_empty() {
            parts.push(format!("{} Pending: {}", pending.len(), list_names(&pending)));
        }
        Evaluation::failed(format!("persistent volumes not healthy; {}", parts.join("; ")))
    };

    Ok(eval
        .observe("volumes", volumes.len())
        .observe("bound", bound)
        .observe("failed", failed.len())
        .observe("pending", pending.len()))
}
