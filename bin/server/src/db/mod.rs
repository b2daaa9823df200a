//! PostgreSQL storage for the washline workflow engine.
//!
//! This module provides data access for:
//! - Workflow definitions with their node and edge sets
//! - Executions and their ordered event logs
//!
//! [`PgWorkflowStore`] combines both repositories behind the
//! [`WorkflowStore`] trait the service layer is written against.

pub mod execution;
pub mod workflow;

pub use execution::{ExecutionRepository, PgExecutionRecorder};
pub use workflow::WorkflowRepository;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use washline_core::{ExecutionId, WorkflowId};
use washline_workflow::{
    ExecutionRecorder, StoreError, Workflow, WorkflowDefinition, WorkflowExecution,
    WorkflowExecutionEvent, WorkflowStore,
};

/// [`WorkflowStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgWorkflowStore {
    workflows: WorkflowRepository,
    executions: ExecutionRepository,
}

impl PgWorkflowStore {
    /// Creates a store over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            workflows: WorkflowRepository::new(pool.clone()),
            executions: ExecutionRepository::new(pool),
        }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    #[instrument(skip_all, fields(workflow_id = %workflow.id()))]
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        self.workflows.insert(workflow).await.map_err(store_error)
    }

    #[instrument(skip_all, fields(workflow_id = %workflow.id()))]
    async fn replace_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        self.workflows.replace(workflow).await.map_err(store_error)
    }

    async fn update_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        self.workflows
            .update_definition(definition)
            .await
            .map_err(store_error)
    }

    async fn find_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        self.workflows.find_by_id(id).await.map_err(store_error)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        self.workflows.list_all().await.map_err(store_error)
    }

    #[instrument(skip(self))]
    async fn list_active_by_trigger(
        &self,
        trigger_type: &str,
    ) -> Result<Vec<Workflow>, StoreError> {
        self.workflows
            .list_active_by_trigger(trigger_type)
            .await
            .map_err(store_error)
    }

    #[instrument(skip_all, fields(execution_id = %execution.id, workflow_id = %execution.workflow_id))]
    async fn begin_execution(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<Box<dyn ExecutionRecorder>, StoreError> {
        let recorder = self.executions.begin(execution).await.map_err(store_error)?;
        Ok(Box::new(recorder))
    }

    async fn find_execution(
        &self,
        id: ExecutionId,
    ) -> Result<Option<WorkflowExecution>, StoreError> {
        self.executions.find_by_id(id).await.map_err(store_error)
    }

    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        self.executions
            .list_for_workflow(workflow_id)
            .await
            .map_err(store_error)
    }

    async fn list_execution_events(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<WorkflowExecutionEvent>, StoreError> {
        self.executions
            .list_events(execution_id)
            .await
            .map_err(store_error)
    }
}

/// Lifts a sqlx failure into the storage error the service understands.
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Decode(source) => StoreError::Decode {
            details: source.to_string(),
        },
        other => StoreError::Database {
            details: other.to_string(),
        },
    }
}

/// Builds the decode error for a column holding an unparseable value.
pub(crate) fn invalid_column(
    what: &str,
    value: &str,
    reason: impl std::fmt::Display,
) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {what} '{value}': {reason}"),
    )))
}
