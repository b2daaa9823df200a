//! In-memory [`WorkflowStore`].
//!
//! Used by tests and for running the engine without a database. An
//! execution recorder buffers its rows and publishes them in one step on
//! `finish`, which gives the same visibility as a committed transaction.

use super::{ExecutionRecorder, WorkflowStore};
use crate::definition::{Workflow, WorkflowDefinition, WorkflowStatus};
use crate::edge::WorkflowEdge;
use crate::error::StoreError;
use crate::execution::{WorkflowExecution, WorkflowExecutionEvent};
use crate::node::WorkflowNode;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use washline_core::{ExecutionId, WorkflowId};

#[derive(Debug, Default)]
struct Tables {
    definitions: HashMap<WorkflowId, WorkflowDefinition>,
    nodes: HashMap<WorkflowId, Vec<WorkflowNode>>,
    edges: HashMap<WorkflowId, Vec<WorkflowEdge>>,
    executions: HashMap<ExecutionId, WorkflowExecution>,
    events: HashMap<ExecutionId, Vec<WorkflowExecutionEvent>>,
}

impl Tables {
    fn hydrate(&self, definition: &WorkflowDefinition) -> Workflow {
        Workflow {
            definition: definition.clone(),
            nodes: self.nodes.get(&definition.id).cloned().unwrap_or_default(),
            edges: self.edges.get(&definition.id).cloned().unwrap_or_default(),
        }
    }

    fn hydrate_all<'a>(
        &self,
        definitions: impl Iterator<Item = &'a WorkflowDefinition>,
    ) -> Vec<Workflow> {
        let mut definitions: Vec<_> = definitions.collect();
        definitions.sort_by_key(|d| (d.created_at, d.id));
        definitions.into_iter().map(|d| self.hydrate(d)).collect()
    }

    fn write_graph(&mut self, workflow: &Workflow) {
        let id = workflow.id();
        self.definitions.insert(id, workflow.definition.clone());
        self.nodes.insert(id, workflow.nodes.clone());
        self.edges.insert(id, workflow.edges.clone());
    }
}

/// A [`WorkflowStore`] held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.definitions.contains_key(&workflow.id()) {
            return Err(StoreError::Database {
                details: format!("workflow {} already exists", workflow.id()),
            });
        }
        tables.write_graph(workflow);
        Ok(())
    }

    async fn replace_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.definitions.contains_key(&workflow.id()) {
            return Err(StoreError::Database {
                details: format!("workflow {} does not exist", workflow.id()),
            });
        }
        tables.write_graph(workflow);
        Ok(())
    }

    async fn update_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.definitions.get_mut(&definition.id) {
            Some(stored) => {
                *stored = definition.clone();
                Ok(())
            }
            None => Err(StoreError::Database {
                details: format!("workflow {} does not exist", definition.id),
            }),
        }
    }

    async fn find_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.definitions.get(&id).map(|d| tables.hydrate(d)))
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.hydrate_all(tables.definitions.values()))
    }

    async fn list_active_by_trigger(
        &self,
        trigger_type: &str,
    ) -> Result<Vec<Workflow>, StoreError> {
        let tables = self.tables.read().await;
        let matching = tables
            .hydrate_all(
                tables
                    .definitions
                    .values()
                    .filter(|d| d.status == WorkflowStatus::Active),
            )
            .into_iter()
            .filter(|w| w.has_trigger(trigger_type))
            .collect();
        Ok(matching)
    }

    async fn begin_execution(
        &self,
        execution: &WorkflowExecution,
    ) -> Result<Box<dyn ExecutionRecorder>, StoreError> {
        Ok(Box::new(MemoryRecorder {
            tables: Arc::clone(&self.tables),
            execution_id: execution.id,
            events: Vec::new(),
        }))
    }

    async fn find_execution(
        &self,
        id: ExecutionId,
    ) -> Result<Option<WorkflowExecution>, StoreError> {
        Ok(self.tables.read().await.executions.get(&id).cloned())
    }

    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let tables = self.tables.read().await;
        let mut executions: Vec<_> = tables
            .executions
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| (b.started_at, b.id).cmp(&(a.started_at, a.id)));
        Ok(executions)
    }

    async fn list_execution_events(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<WorkflowExecutionEvent>, StoreError> {
        let tables = self.tables.read().await;
        let mut events = tables.events.get(&execution_id).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }
}

struct MemoryRecorder {
    tables: Arc<RwLock<Tables>>,
    execution_id: ExecutionId,
    events: Vec<WorkflowExecutionEvent>,
}

#[async_trait]
impl ExecutionRecorder for MemoryRecorder {
    async fn append(&mut self, event: WorkflowExecutionEvent) -> Result<(), StoreError> {
        if event.execution_id != self.execution_id {
            return Err(StoreError::Database {
                details: format!(
                    "event for {} appended to execution {}",
                    event.execution_id, self.execution_id
                ),
            });
        }
        self.events.push(event);
        Ok(())
    }

    async fn finish(self: Box<Self>, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let this = *self;
        let mut tables = this.tables.write().await;
        tables.executions.insert(this.execution_id, execution.clone());
        tables.events.insert(this.execution_id, this.events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowDraft;
    use crate::execution::{ExecutionEventType, ExecutionLogEntry, ExecutionStatus};
    use crate::node::NodeSpec;
    use serde_json::json;

    fn draft(status: WorkflowStatus, trigger_type: &str) -> WorkflowDraft {
        WorkflowDraft::new("wf")
            .with_status(status)
            .with_node(NodeSpec::trigger("start", trigger_type))
            .with_node(NodeSpec::action("notify", "notifications.dispatch"))
            .with_edge("start", "notify")
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let store = MemoryStore::new();
        let workflow = Workflow::from_draft(&draft(WorkflowStatus::Draft, "orders.created"));
        store.insert_workflow(&workflow).await.expect("insert");

        let found = store.find_workflow(workflow.id()).await.expect("find");
        assert_eq!(found, Some(workflow.clone()));
        assert!(store.insert_workflow(&workflow).await.is_err());
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_graph() {
        let store = MemoryStore::new();
        let mut workflow = Workflow::from_draft(&draft(WorkflowStatus::Draft, "orders.created"));
        store.insert_workflow(&workflow).await.expect("insert");

        workflow.replace_with(&WorkflowDraft::new("wf").with_node(NodeSpec::trigger(
            "only",
            "customers.segmented",
        )));
        store.replace_workflow(&workflow).await.expect("replace");

        let found = store
            .find_workflow(workflow.id())
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.nodes.len(), 1);
        assert!(found.edges.is_empty());
    }

    #[tokio::test]
    async fn active_by_trigger_skips_drafts_and_other_types() {
        let store = MemoryStore::new();
        let active = Workflow::from_draft(&draft(WorkflowStatus::Active, "orders.created"));
        let drafted = Workflow::from_draft(&draft(WorkflowStatus::Draft, "orders.created"));
        let other = Workflow::from_draft(&draft(WorkflowStatus::Active, "customers.segmented"));
        for w in [&active, &drafted, &other] {
            store.insert_workflow(w).await.expect("insert");
        }

        let matched = store
            .list_active_by_trigger("orders.created")
            .await
            .expect("list");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id(), active.id());
    }

    #[tokio::test]
    async fn recorder_publishes_only_on_finish() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let mut execution = WorkflowExecution::new(workflow_id, "orders.created", json!({}));
        execution.start();

        let mut recorder = store.begin_execution(&execution).await.expect("begin");
        recorder
            .append(WorkflowExecutionEvent::new(
                execution.id,
                0,
                ExecutionLogEntry::new(ExecutionEventType::NoTrigger),
            ))
            .await
            .expect("append");
        assert!(store.find_execution(execution.id).await.expect("find").is_none());

        execution.finish(ExecutionStatus::Failed, Default::default());
        recorder.finish(&execution).await.expect("finish");

        let stored = store
            .find_execution(execution.id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, ExecutionStatus::Failed);
        let events = store.list_execution_events(execution.id).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(store.list_executions(workflow_id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn dropped_recorder_leaves_no_trace() {
        let store = MemoryStore::new();
        let mut execution = WorkflowExecution::new(WorkflowId::new(), "orders.created", json!({}));
        execution.start();
        {
            let mut recorder = store.begin_execution(&execution).await.expect("begin");
            recorder
                .append(WorkflowExecutionEvent::new(
                    execution.id,
                    0,
                    ExecutionLogEntry::new(ExecutionEventType::NodeStarted),
                ))
                .await
                .expect("append");
        }
        assert!(store.find_execution(execution.id).await.expect("find").is_none());
        assert!(
            store
                .list_execution_events(execution.id)
                .await
                .expect("events")
                .is_empty()
        );
    }
}
