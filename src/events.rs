//! Run completion events.
//!
//! After a run is rendered, the session publishes one [`RunCompleted`]
//! event. Delivery (chat, webhook, scheduler) belongs to whoever implements
//! [`EventSink`]; sinks report their own delivery problems and never affect
//! the run.

use crate::engine::result::Report;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Emitted once per run, after rendering and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCompleted {
    pub report: Report,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: RunCompleted);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn publish(&self, _event: RunCompleted) {}
}

/// Forwards events to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RunCompleted>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunCompleted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: RunCompleted) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped; discarding RunCompleted");
        }
    }
}

/// Appends each event as one JSON line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonLinesSink { path: path.into() }
    }

    async fn append(&self, event: &RunCompleted) -> Result<(), String> {
        let mut line = serde_json::to_string(event).map_err(|e| e.to_string())?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| e.to_string())?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        file.flush().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl EventSink for JsonLinesSink {
    async fn publish(&self, event: RunCompleted) {
        if let Err(e) = self.append(&event).await {
            error!(path = %self.path.display(), error = %e, "failed to write RunCompleted event");
        }
    }
}
