//! Durable report storage.
//!
//! Each run produces one append-only log file and one report document in
//! the output directory, both named by cluster, mode and run start time:
//! `prod-east-pre-20240501T100000Z.log` and `.json` (or `.xml`).

use crate::engine::result::Report;
use crate::output::Rendered;
use crate::PreflightError;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

/// Where a run's artifacts were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedPaths {
    pub log: PathBuf,
    pub document: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ReportStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem shared by a run's log and document.
    pub fn stem(report: &Report) -> String {
        format!(
            "{}-{}-{}",
            sanitize(&report.cluster.name),
            report.mode,
            report.started_at.format("%Y%m%dT%H%M%SZ")
        )
    }

    pub fn log_path(&self, report: &Report) -> PathBuf {
        self.dir.join(format!("{}.log", Self::stem(report)))
    }

    pub fn document_path(&self, report: &Report, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", Self::stem(report), extension))
    }

    /// Append the log lines and write the document.
    pub async fn persist(
        &self,
        report: &Report,
        rendered: &Rendered,
    ) -> Result<PersistedPaths, PreflightError> {
        let result = self.write_all(report, rendered).await;
        match &result {
            Ok(paths) => info!(
                log = %paths.log.display(),
                document = %paths.document.display(),
                "report written"
            ),
            Err(e) => error!(error = %e, "failed to write report"),
        }
        result
    }

    async fn write_all(
        &self,
        report: &Report,
        rendered: &Rendered,
    ) -> Result<PersistedPaths, PreflightError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PreflightError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let log = self.log_path(report);
        let mut content = rendered.log_entries.join("\n");
        content.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log)
            .await
            .map_err(|source| io_error(&log, source))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|source| io_error(&log, source))?;
        file.flush().await.map_err(|source| io_error(&log, source))?;

        let document = self.document_path(report, rendered.extension);
        fs::write(&document, rendered.document.as_bytes())
            .await
            .map_err(|source| io_error(&document, source))?;

        Ok(PersistedPaths { log, document })
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PreflightError {
    PreflightError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Keep cluster names usable as file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
