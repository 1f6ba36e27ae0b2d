//! Execution recording.
//!
//! Persists the execution record and emits the per-run telemetry event.
//! Recording is strictly a side channel: a run that finished keeps its
//! outcome even when the store or sink is down, so both failures are
//! logged and swallowed here rather than surfaced to the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::storage::{Execution, ExecutionStore};
use crate::telemetry::{EventSink, TelemetryEvent};

/// Records finished (or denied) executions.
pub struct ExecutionRecorder {
    store: Arc<dyn ExecutionStore>,
    events: Arc<dyn EventSink>,
}

impl ExecutionRecorder {
    pub fn new(store: Arc<dyn ExecutionStore>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Persist the record and emit its `automation_run` event.
    pub async fn record(&self, execution: &Execution) {
        if let Err(e) = self.store.save_execution(execution).await {
            warn!(
                execution_id = %execution.id,
                error = %e,
                "Failed to persist execution record"
            );
        }

        let event = TelemetryEvent::automation_run(execution);
        if let Err(e) = self.events.emit(event).await {
            debug!(
                execution_id = %execution.id,
                error = %e,
                "Failed to emit telemetry event"
            );
        }
    }
}
