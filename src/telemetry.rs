//! Telemetry events and tracing setup.
//!
//! The engine emits one `automation_run` event per execution through an
//! [`EventSink`]. The default sink writes structured tracing logs;
//! embedders can plug in their own sink to forward events to an
//! analytics pipeline. Emission failures never affect execution
//! outcomes.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::storage::Execution;

/// A single telemetry event.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub event_type: String,
    pub meta: Value,
}

impl TelemetryEvent {
    /// The per-execution event emitted once per run.
    pub fn automation_run(execution: &Execution) -> Self {
        let mut meta = json!({
            "workflow_id": execution.workflow_id,
            "execution_id": execution.id,
            "tenant_id": execution.tenant_id,
            "status": execution.status.to_string(),
        });
        if let Some(duration_ms) = execution.duration_ms() {
            meta["duration_ms"] = json!(duration_ms);
        }
        if let Some(error) = &execution.error {
            meta["error"] = json!(error);
        }
        Self {
            event_type: "automation_run".to_string(),
            meta,
        }
    }
}

/// Destination for telemetry events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: TelemetryEvent) -> Result<()>;
}

/// Sink that writes events as structured log lines.
#[derive(Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn emit(&self, event: TelemetryEvent) -> Result<()> {
        info!(
            target: "autom8::telemetry",
            event_type = %event.event_type,
            meta = %event.meta,
            "Telemetry event"
        );
        Ok(())
    }
}

/// Sink that buffers events in memory. Used in tests.
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, event: TelemetryEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Initialize tracing with an env-filtered fmt subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
