//! Execution sinks.
//!
//! The traversal writes every log entry to a sink. Real runs use a
//! [`RecordingSink`] that appends events inside the execution's open
//! transaction; simulations use [`SimulationSink`], which keeps nothing.

use crate::error::StoreError;
use crate::execution::{ExecutionLogEntry, WorkflowExecution, WorkflowExecutionEvent};
use crate::store::ExecutionRecorder;
use async_trait::async_trait;
use serde::Serialize;
use washline_core::ExecutionId;

/// Whether a run touches the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Real run with persisted history.
    Live,
    /// Dry run, nothing persisted.
    Simulation,
}

/// Destination for a run's log entries.
#[async_trait]
pub trait ExecutionSink: Send {
    /// The mode actions are invoked in.
    fn mode(&self) -> RunMode;

    /// Records one entry as it happens.
    async fn record(&mut self, entry: &ExecutionLogEntry) -> Result<(), StoreError>;
}

/// Sink for simulations. Records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulationSink;

#[async_trait]
impl ExecutionSink for SimulationSink {
    fn mode(&self) -> RunMode {
        RunMode::Simulation
    }

    async fn record(&mut self, _entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Sink for real runs, backed by an open execution transaction.
pub struct RecordingSink {
    execution_id: ExecutionId,
    recorder: Box<dyn ExecutionRecorder>,
    next_sequence: i64,
}

impl RecordingSink {
    /// Wraps a recorder returned by [`WorkflowStore::begin_execution`](crate::store::WorkflowStore::begin_execution).
    #[must_use]
    pub fn new(execution_id: ExecutionId, recorder: Box<dyn ExecutionRecorder>) -> Self {
        Self {
            execution_id,
            recorder,
            next_sequence: 0,
        }
    }

    /// Returns how many events were appended.
    #[must_use]
    pub fn recorded(&self) -> i64 {
        self.next_sequence
    }

    /// Writes the final execution row and closes the transaction.
    ///
    /// # Errors
    ///
    /// Returns the store error if the final write or commit fails.
    pub async fn finish(self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        self.recorder.finish(execution).await
    }
}

#[async_trait]
impl ExecutionSink for RecordingSink {
    fn mode(&self) -> RunMode {
        RunMode::Live
    }

    async fn record(&mut self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        let event = WorkflowExecutionEvent::new(self.execution_id, self.next_sequence, entry.clone());
        self.recorder.append(event).await?;
        self.next_sequence += 1;
        Ok(())
    }
}
