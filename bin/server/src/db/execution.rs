//! Database repository for workflow executions and their event logs.

use super::{invalid_column, store_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{Acquire, FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use tracing::{debug, warn};
use washline_core::{ExecutionEventId, ExecutionId, NodeId, WorkflowId};
use washline_workflow::{
    Context, ExecutionEventType, ExecutionLogEntry, ExecutionRecorder, ExecutionStatus,
    StoreError, WorkflowExecution, WorkflowExecutionEvent,
};

/// Row type for execution queries.
#[derive(FromRow)]
struct ExecutionRow {
    id: String,
    workflow_id: String,
    trigger_type: String,
    status: String,
    payload: JsonValue,
    context: Json<Context>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRow {
    fn try_into_execution(self) -> Result<WorkflowExecution, sqlx::Error> {
        let id = ExecutionId::from_str(&self.id)
            .map_err(|e| invalid_column("execution id", &self.id, e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| invalid_column("workflow id", &self.workflow_id, e))?;
        let status = ExecutionStatus::parse(&self.status)
            .ok_or_else(|| invalid_column("execution status", &self.status, "unknown status"))?;

        Ok(WorkflowExecution {
            id,
            workflow_id,
            trigger_type: self.trigger_type,
            status,
            payload: self.payload,
            context: self.context.0,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// Row type for execution event queries.
#[derive(FromRow)]
struct EventRow {
    id: String,
    execution_id: String,
    sequence: i64,
    event_type: String,
    node_id: Option<String>,
    node_key: Option<String>,
    node_type: Option<String>,
    message: Option<String>,
    payload: Option<JsonValue>,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn try_into_event(self) -> Result<WorkflowExecutionEvent, sqlx::Error> {
        let id = ExecutionEventId::from_str(&self.id)
            .map_err(|e| invalid_column("event id", &self.id, e))?;
        let execution_id = ExecutionId::from_str(&self.execution_id)
            .map_err(|e| invalid_column("execution id", &self.execution_id, e))?;
        let event_type = ExecutionEventType::parse(&self.event_type)
            .ok_or_else(|| invalid_column("event type", &self.event_type, "unknown event type"))?;
        let node_id = self
            .node_id
            .as_deref()
            .map(|raw| NodeId::from_str(raw).map_err(|e| invalid_column("node id", raw, e)))
            .transpose()?;

        Ok(WorkflowExecutionEvent {
            id,
            execution_id,
            sequence: self.sequence,
            entry: ExecutionLogEntry {
                event_type,
                node_id,
                node_key: self.node_key,
                node_type: self.node_type,
                message: self.message,
                payload: self.payload,
                timestamp: self.created_at,
            },
        })
    }
}

/// Repository for executions and execution events.
#[derive(Clone)]
pub struct ExecutionRepository {
    pool: PgPool,
}

impl ExecutionRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the run transaction and inserts the execution row.
    ///
    /// Nothing written through the returned recorder is visible until
    /// [`ExecutionRecorder::finish`] commits.
    pub async fn begin(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<PgExecutionRecorder, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO workflow_executions
                (id, workflow_id, trigger_type, status, payload, context, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(&execution.trigger_type)
        .bind(execution.status.as_str())
        .bind(&execution.payload)
        .bind(Json(&execution.context))
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .execute(&mut *tx)
        .await?;

        Ok(PgExecutionRecorder {
            tx,
            execution_id: execution.id,
        })
    }

    /// Finds an execution by ID.
    pub async fn find_by_id(
        &self,
        id: ExecutionId,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error> {
        let row: Option<ExecutionRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, trigger_type, status, payload, context,
                   started_at, completed_at
            FROM workflow_executions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ExecutionRow::try_into_execution).transpose()
    }

    /// Lists executions for a workflow, newest first.
    pub async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, sqlx::Error> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, trigger_type, status, payload, context,
                   started_at, completed_at
            FROM workflow_executions
            WHERE workflow_id = $1
            ORDER BY started_at DESC NULLS LAST, id DESC
            "#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ExecutionRow::try_into_execution).collect()
    }

    /// Lists an execution's events in sequence order.
    pub async fn list_events(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<WorkflowExecutionEvent>, sqlx::Error> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, execution_id, sequence, event_type, node_id, node_key,
                   node_type, message, payload, created_at
            FROM workflow_execution_events
            WHERE execution_id = $1
            ORDER BY sequence
            "#,
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRow::try_into_event).collect()
    }
}

/// One run's open transaction.
///
/// Dropping it without [`finish`](ExecutionRecorder::finish) rolls back the
/// execution row and every appended event. Each append runs under its own
/// savepoint, so a rejected event leaves the transaction usable for the
/// final status write.
pub struct PgExecutionRecorder {
    tx: Transaction<'static, Postgres>,
    execution_id: ExecutionId,
}

#[async_trait]
impl ExecutionRecorder for PgExecutionRecorder {
    async fn append(&mut self, event: WorkflowExecutionEvent) -> Result<(), StoreError> {
        let mut savepoint = Acquire::begin(&mut self.tx).await.map_err(store_error)?;
        let entry = &event.entry;
        let inserted = sqlx::query(
            r#"
            INSERT INTO workflow_execution_events
                (id, execution_id, sequence, event_type, node_id, node_key,
                 node_type, message, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.execution_id.to_string())
        .bind(event.sequence)
        .bind(entry.event_type.as_str())
        .bind(entry.node_id.map(|id| id.to_string()))
        .bind(&entry.node_key)
        .bind(&entry.node_type)
        .bind(&entry.message)
        .bind(&entry.payload)
        .bind(entry.timestamp)
        .execute(&mut *savepoint)
        .await;

        match inserted {
            Ok(_) => savepoint.commit().await.map_err(store_error),
            Err(e) => {
                if let Err(rollback) = savepoint.rollback().await {
                    warn!(
                        execution_id = %self.execution_id,
                        error = %rollback,
                        "failed to roll back event savepoint"
                    );
                }
                Err(store_error(e))
            }
        }
    }

    async fn finish(self: Box<Self>, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let mut this = *self;

        sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $2, context = $3, started_at = $4, completed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(this.execution_id.to_string())
        .bind(execution.status.as_str())
        .bind(Json(&execution.context))
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .execute(&mut *this.tx)
        .await
        .map_err(store_error)?;

        this.tx.commit().await.map_err(store_error)?;
        debug!(execution_id = %this.execution_id, status = %execution.status, "execution committed");
        Ok(())
    }
}
