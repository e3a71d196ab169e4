//! Event/learning sinks
//!
//! Fire-and-forget: `record` never blocks the caller and never reports
//! failure back into the decision path.

use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::models::protection::EngineEvent;

pub trait EventSink: Send + Sync {
    fn record(&self, event: EngineEvent);
}

/// Emits every event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: EngineEvent) {
        match &event {
            EngineEvent::Protection(decision) => info!(
                target: "crossguard::events",
                symbol = %decision.symbol,
                action = %decision.action,
                admitted = decision.admitted,
                reasons = ?decision.blocking_reasons,
                "protection decision"
            ),
            EngineEvent::Crossover(crossover) => info!(
                target: "crossguard::events",
                symbol = %crossover.symbol,
                kind = ?crossover.kind,
                timestamp = %crossover.timestamp,
                "crossover"
            ),
        }
    }
}

/// Appends events as JSON lines to a file from a background task.
pub struct JsonlEventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl JsonlEventSink {
    /// Start the writer task. The task ends once every sender is dropped.
    pub fn spawn(path: PathBuf) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();

        let handle = tokio::spawn(async move {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!(path = %path.display(), error = %e, "JsonlEventSink: cannot create directory");
                    return;
                }
            }
            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "JsonlEventSink: cannot open event log");
                    return;
                }
            };
            info!(path = %path.display(), "JsonlEventSink: writing events");

            while let Some(event) = rx.recv().await {
                let mut line = match serde_json::to_vec(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(error = %e, "JsonlEventSink: failed to serialize event");
                        continue;
                    }
                };
                line.push(b'\n');
                if let Err(e) = file.write_all(&line).await {
                    error!(error = %e, "JsonlEventSink: write failed");
                }
            }

            if let Err(e) = file.flush().await {
                error!(error = %e, "JsonlEventSink: flush failed");
            }
            debug!("JsonlEventSink: writer stopped");
        });

        (Self { tx }, handle)
    }
}

impl EventSink for JsonlEventSink {
    fn record(&self, event: EngineEvent) {
        // Writer gone means the log is closed; events are best-effort.
        let _ = self.tx.send(event);
    }
}

/// Forwards each event to every inner sink.
pub struct FanoutEventSink {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutEventSink {
    fn record(&self, event: EngineEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}
