//! Persistence for workflow definitions and execution history.
//!
//! The facade talks to storage only through [`WorkflowStore`]. Graph writes
//! are atomic: a definition and its complete node/edge set are written in
//! one transaction. A real run holds one transaction open for its whole
//! duration through an [`ExecutionRecorder`].

pub mod memory;

pub use memory::MemoryStore;

use crate::definition::{Workflow, WorkflowDefinition};
use crate::error::StoreError;
use crate::execution::{WorkflowExecution, WorkflowExecutionEvent};
use async_trait::async_trait;
use washline_core::{ExecutionId, WorkflowId};

/// Storage for workflows and their execution history.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Inserts a new definition with its nodes and edges, atomically.
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

    /// Updates the definition and replaces its whole node and edge set, atomically.
    ///
    /// Existing nodes and edges are deleted and the new ones inserted; nothing is diffed.
    async fn replace_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

    /// Writes definition fields only (status, timestamps, name), leaving the graph alone.
    async fn update_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;

    /// Loads a workflow with its current graph.
    async fn find_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError>;

    /// Loads every workflow, oldest first.
    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError>;

    /// Loads active workflows having a trigger node of the given type, oldest first.
    async fn list_active_by_trigger(&self, trigger_type: &str)
    -> Result<Vec<Workflow>, StoreError>;

    /// Opens the execution transaction and inserts the running execution row.
    async fn begin_execution(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<Box<dyn ExecutionRecorder>, StoreError>;

    /// Loads an execution row.
    async fn find_execution(&self, id: ExecutionId)
    -> Result<Option<WorkflowExecution>, StoreError>;

    /// Lists a workflow's executions, newest first.
    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, StoreError>;

    /// Lists an execution's events in sequence order.
    async fn list_execution_events(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<WorkflowExecutionEvent>, StoreError>;
}

/// Handle on one execution's open transaction.
///
/// Dropping the recorder without calling [`finish`](Self::finish) abandons
/// the transaction; nothing it wrote becomes visible.
#[async_trait]
pub trait ExecutionRecorder: Send {
    /// Appends one event inside the transaction.
    async fn append(&mut self, event: WorkflowExecutionEvent) -> Result<(), StoreError>;

    /// Writes the final execution row and commits.
    async fn finish(self: Box<Self>, execution: &WorkflowExecution) -> Result<(), StoreError>;
}
