//! Workflow facade.
//!
//! [`WorkflowService`] ties the engine to a [`WorkflowStore`]: graphs are
//! validated before every write, real runs are recorded inside one store
//! transaction each, and simulations never touch the store's execution
//! tables.

use crate::definition::{Workflow, WorkflowDefinition, WorkflowDraft, WorkflowStatus};
use crate::engine::{Catalog, Engine, ExecutionFault, PreparedTrigger};
use crate::error::WorkflowError;
use crate::execution::{ExecutionHistory, ExecutionReport, ExecutionStatus, WorkflowExecution};
use crate::graph::ValidationReport;
use crate::sink::{RecordingSink, SimulationSink};
use crate::store::WorkflowStore;
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use washline_core::{ExecutionId, WorkflowId};

/// Entry point for managing and running workflows.
pub struct WorkflowService<S> {
    engine: Arc<Engine>,
    store: S,
}

impl<S: Clone> Clone for WorkflowService<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            store: self.store.clone(),
        }
    }
}

impl<S: WorkflowStore> WorkflowService<S> {
    /// Creates a service over an engine and a store.
    pub fn new(engine: Engine, store: S) -> Self {
        Self {
            engine: Arc::new(engine),
            store,
        }
    }

    /// The engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lists registered triggers and actions.
    pub fn catalog(&self) -> Catalog {
        self.engine.catalog()
    }

    fn check_graph(
        &self,
        draft: &WorkflowDraft,
    ) -> Result<ValidationReport, Report<WorkflowError>> {
        let report = self.engine.validate(&draft.nodes, &draft.edges);
        if !report.valid {
            return Err(WorkflowError::InvalidGraph {
                errors: report.errors,
            }
            .into());
        }
        Ok(report)
    }

    /// Validates and stores a new workflow.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidGraph`] with the validator's errors,
    /// [`WorkflowError::InvalidStateTransition`] when created as archived, or
    /// a storage error. Nothing is written on error.
    #[instrument(skip_all, fields(name = %draft.name))]
    pub async fn create_workflow(
        &self,
        draft: WorkflowDraft,
    ) -> Result<Workflow, Report<WorkflowError>> {
        if draft.status == WorkflowStatus::Archived {
            return Err(WorkflowError::InvalidStateTransition {
                from: WorkflowStatus::Draft.to_string(),
                to: WorkflowStatus::Archived.to_string(),
            }
            .into());
        }
        self.check_graph(&draft)?;

        let workflow = Workflow::from_draft(&draft);
        self.store
            .insert_workflow(&workflow)
            .await
            .map_err(WorkflowError::Store)?;
        info!(workflow_id = %workflow.id(), nodes = workflow.nodes.len(), "workflow created");
        Ok(workflow)
    }

    /// Validates a draft and replaces a workflow's definition and whole graph.
    ///
    /// Returns `None` if the workflow does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidStateTransition`] for archived
    /// workflows or a request to archive, [`WorkflowError::InvalidGraph`],
    /// or a storage error. Nothing is written on error.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn update_workflow(
        &self,
        id: WorkflowId,
        draft: WorkflowDraft,
    ) -> Result<Option<Workflow>, Report<WorkflowError>> {
        let Some(mut workflow) = self
            .store
            .find_workflow(id)
            .await
            .map_err(WorkflowError::Store)?
        else {
            return Ok(None);
        };

        let current = workflow.status();
        if !current.can_update_to(draft.status) {
            return Err(WorkflowError::InvalidStateTransition {
                from: current.to_string(),
                to: draft.status.to_string(),
            }
            .into());
        }
        self.check_graph(&draft)?;

        workflow.replace_with(&draft);
        self.store
            .replace_workflow(&workflow)
            .await
            .map_err(WorkflowError::Store)?;
        info!(status = %workflow.status(), nodes = workflow.nodes.len(), "workflow updated");
        Ok(Some(workflow))
    }

    /// Loads a workflow with its graph.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self))]
    pub async fn get_workflow(
        &self,
        id: WorkflowId,
    ) -> Result<Option<Workflow>, Report<WorkflowError>> {
        Ok(self
            .store
            .find_workflow(id)
            .await
            .map_err(WorkflowError::Store)?)
    }

    /// Lists every workflow, archived ones included, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self))]
    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, Report<WorkflowError>> {
        Ok(self
            .store
            .list_workflows()
            .await
            .map_err(WorkflowError::Store)?)
    }

    /// Archives a workflow. Archiving twice is a no-op.
    ///
    /// Returns the archived definition, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self))]
    pub async fn delete_workflow(
        &self,
        id: WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, Report<WorkflowError>> {
        let Some(workflow) = self
            .store
            .find_workflow(id)
            .await
            .map_err(WorkflowError::Store)?
        else {
            return Ok(None);
        };

        let mut definition = workflow.definition;
        if definition.status != WorkflowStatus::Archived {
            definition.archive();
            self.store
                .update_definition(&definition)
                .await
                .map_err(WorkflowError::Store)?;
            info!("workflow archived");
        }
        Ok(Some(definition))
    }

    /// Re-validates a stored graph against the current registries.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self))]
    pub async fn validate_workflow(
        &self,
        id: WorkflowId,
    ) -> Result<Option<ValidationReport>, Report<WorkflowError>> {
        let Some(workflow) = self
            .store
            .find_workflow(id)
            .await
            .map_err(WorkflowError::Store)?
        else {
            return Ok(None);
        };
        let (nodes, edges) = workflow.to_specs();
        Ok(Some(self.engine.validate(&nodes, &edges)))
    }

    /// Dry-runs a workflow in any status without recording anything.
    ///
    /// Returns `None` if the workflow does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Trigger`] for an unregistered trigger type, an
    /// invalid payload or a resolver failure, and
    /// [`WorkflowError::ExecutionFault`] if an action faults.
    #[instrument(skip(self, payload))]
    pub async fn simulate_workflow(
        &self,
        id: WorkflowId,
        trigger_type: &str,
        payload: &JsonValue,
    ) -> Result<Option<ExecutionReport>, Report<WorkflowError>> {
        let Some(workflow) = self
            .store
            .find_workflow(id)
            .await
            .map_err(WorkflowError::Store)?
        else {
            return Ok(None);
        };
        let prepared = self
            .engine
            .prepare_trigger(trigger_type, payload)
            .await
            .map_err(WorkflowError::Trigger)?;

        let trigger = prepared.info(id, None);
        let outcome = self
            .engine
            .execute(&workflow, &trigger, payload, prepared.context, &mut SimulationSink)
            .await;
        if let Some(fault) = outcome.fault {
            error!(error = %fault, "simulation faulted");
            return Err(WorkflowError::ExecutionFault {
                workflow_id: id,
                execution_id: None,
                reason: fault.to_string(),
            }
            .into());
        }
        info!(status = %outcome.status, duration_ms = outcome.duration_ms, "simulation finished");
        Ok(Some(outcome.into_report(id, None)))
    }

    /// Fires a trigger: runs every active workflow with a matching trigger node.
    ///
    /// Workflows run one after another, oldest first. A failed run does not
    /// stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Trigger`] before anything runs if the trigger
    /// type is unregistered, the payload is invalid, or context resolution
    /// fails. A fault or storage error during a run is returned after that
    /// run's execution record is finalized; later workflows are not run.
    #[instrument(skip(self, payload))]
    pub async fn run_trigger(
        &self,
        trigger_type: &str,
        payload: &JsonValue,
    ) -> Result<Vec<ExecutionReport>, Report<WorkflowError>> {
        let prepared = self
            .engine
            .prepare_trigger(trigger_type, payload)
            .await
            .map_err(WorkflowError::Trigger)?;
        let workflows = self
            .store
            .list_active_by_trigger(trigger_type)
            .await
            .map_err(WorkflowError::Store)?;
        if workflows.is_empty() {
            info!("no active workflow listens to this trigger");
        }

        let mut reports = Vec::with_capacity(workflows.len());
        for workflow in &workflows {
            reports.push(self.run_workflow(workflow, &prepared, payload).await?);
        }
        Ok(reports)
    }

    #[instrument(skip_all, fields(workflow_id = %workflow.id()))]
    async fn run_workflow(
        &self,
        workflow: &Workflow,
        prepared: &PreparedTrigger,
        payload: &JsonValue,
    ) -> Result<ExecutionReport, Report<WorkflowError>> {
        let mut execution =
            WorkflowExecution::new(workflow.id(), &prepared.trigger_type, payload.clone());
        execution.start();
        let recorder = self
            .store
            .begin_execution(&execution)
            .await
            .map_err(WorkflowError::Store)?;
        let mut sink = RecordingSink::new(execution.id, recorder);

        let trigger = prepared.info(workflow.id(), Some(execution.id));
        let outcome = self
            .engine
            .execute(workflow, &trigger, payload, prepared.context.clone(), &mut sink)
            .await;

        execution.finish(outcome.status, outcome.context.clone());
        let events = sink.recorded();
        if let Err(e) = sink.finish(&execution).await {
            error!(execution_id = %execution.id, error = %e, "failed to finalize execution");
            let report: Report<WorkflowError> = WorkflowError::Store(e).into();
            return Err(match &outcome.fault {
                Some(fault) => report.attach(format!("run faulted before finalizing: {fault}")),
                None => report,
            });
        }
        info!(
            execution_id = %execution.id,
            status = %outcome.status,
            events,
            duration_ms = outcome.duration_ms,
            "execution finished"
        );

        if let Some(fault) = outcome.fault {
            error!(execution_id = %execution.id, error = %fault, "execution faulted");
            let reason = fault.to_string();
            return Err(match fault {
                ExecutionFault::Sink(e) => WorkflowError::Store(e),
                ExecutionFault::Action { .. } => WorkflowError::ExecutionFault {
                    workflow_id: workflow.id(),
                    execution_id: Some(execution.id),
                    reason,
                },
            }
            .into());
        }
        if outcome.status == ExecutionStatus::Failed {
            warn!(execution_id = %execution.id, "execution failed");
        }
        Ok(outcome.into_report(workflow.id(), Some(execution.id)))
    }

    /// Lists a workflow's executions, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self))]
    pub async fn list_executions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, Report<WorkflowError>> {
        Ok(self
            .store
            .list_executions(workflow_id)
            .await
            .map_err(WorkflowError::Store)?)
    }

    /// Loads an execution with its ordered events.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self))]
    pub async fn get_execution(
        &self,
        id: ExecutionId,
    ) -> Result<Option<ExecutionHistory>, Report<WorkflowError>> {
        let Some(execution) = self
            .store
            .find_execution(id)
            .await
            .map_err(WorkflowError::Store)?
        else {
            return Ok(None);
        };
        let events = self
            .store
            .list_execution_events(id)
            .await
            .map_err(WorkflowError::Store)?;
        Ok(Some(ExecutionHistory { execution, events }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionInvocation, ActionResult};
    use crate::builtin;
    use crate::config::WebhookConfig;
    use crate::error::{ActionError, StoreError, TriggerError};
    use crate::execution::ExecutionEventType;
    use crate::node::NodeSpec;
    use crate::execution::WorkflowExecutionEvent;
    use crate::store::{ExecutionRecorder, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;

    /// Fails or faults depending on its `mode` config entry.
    struct Flaky;

    #[async_trait]
    impl Action for Flaky {
        fn action_type(&self) -> &str {
            "test.flaky"
        }

        fn label(&self) -> &str {
            "Flaky"
        }

        async fn run(&self, invocation: ActionInvocation<'_>) -> Result<ActionResult, ActionError> {
            match invocation.node.config.get("mode").and_then(JsonValue::as_str) {
                Some("fault") => Err(ActionError::new("exploded")),
                Some("fail") => Ok(ActionResult::failure("declined")),
                _ => Ok(ActionResult::success().with_patch("flaky", true)),
            }
        }
    }

    fn service() -> WorkflowService<MemoryStore> {
        let engine = builtin::register(Engine::builder(), &WebhookConfig::default())
            .expect("builtins")
            .action(Flaky)
            .build();
        WorkflowService::new(engine, MemoryStore::new())
    }

    fn order_flow() -> WorkflowDraft {
        WorkflowDraft::new("Order follow-up")
            .with_status(WorkflowStatus::Active)
            .with_node(NodeSpec::trigger("start", "orders.created"))
            .with_node(
                NodeSpec::action("notify", "notifications.dispatch").with_config("channel", "email"),
            )
            .with_node(
                NodeSpec::action("crm", "crm.update_field").with_config("field", "lifetime_value"),
            )
            .with_edge("start", "notify")
            .with_edge("notify", "crm")
    }

    fn flaky_flow(name: &str, mode: &str) -> WorkflowDraft {
        WorkflowDraft::new(name)
            .with_status(WorkflowStatus::Active)
            .with_node(NodeSpec::trigger("start", "orders.created"))
            .with_node(NodeSpec::action("step", "test.flaky").with_config("mode", mode))
            .with_edge("start", "step")
    }

    #[tokio::test]
    async fn order_scenario_completes_and_is_recorded() {
        let service = service();
        let workflow = service.create_workflow(order_flow()).await.expect("create");

        let reports = service
            .run_trigger("orders.created", &json!({ "orderId": "o1", "total": 42 }))
            .await
            .expect("run");
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.status, ExecutionStatus::Completed);
        let completed: Vec<_> = report
            .entries(ExecutionEventType::ActionCompleted)
            .filter_map(|e| e.node_type.as_deref())
            .collect();
        assert_eq!(completed, vec!["notifications.dispatch", "crm.update_field"]);
        assert_eq!(report.context.get("lastNotificationChannel"), Some(&json!("email")));
        assert_eq!(report.context.get("crm:lifetime_value"), Some(&json!(42)));

        let executions = service.list_executions(workflow.id()).await.expect("list");
        assert_eq!(executions.len(), 1);
        assert_eq!(Some(executions[0].id), report.execution_id);
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        assert!(executions[0].completed_at.is_some());

        let history = service
            .get_execution(executions[0].id)
            .await
            .expect("get")
            .expect("present");
        let types: Vec<_> = history.events.iter().map(|e| e.entry.event_type).collect();
        assert_eq!(
            types,
            vec![
                ExecutionEventType::NodeStarted,
                ExecutionEventType::ActionCompleted,
                ExecutionEventType::NodeStarted,
                ExecutionEventType::ActionCompleted,
            ]
        );
        let sequences: Vec<_> = history.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn create_then_get_round_trips_graph() {
        let service = service();
        let draft = order_flow();
        let created = service.create_workflow(draft.clone()).await.expect("create");
        let fetched = service
            .get_workflow(created.id())
            .await
            .expect("get")
            .expect("present");
        let (nodes, edges) = fetched.to_specs();
        assert_eq!(nodes, draft.nodes);
        assert_eq!(edges, draft.edges);
        assert_eq!(
            fetched.definition.metadata.action_types,
            vec!["crm.update_field", "notifications.dispatch"]
        );
    }

    #[tokio::test]
    async fn invalid_graph_is_rejected_without_writes() {
        let service = service();
        let draft = WorkflowDraft::new("broken")
            .with_node(NodeSpec::action("notify", "notifications.dispatch"))
            .with_edge("notify", "ghost");

        let err = service.create_workflow(draft).await.unwrap_err();
        let WorkflowError::InvalidGraph { errors } = err.current_context() else {
            panic!("expected invalid graph");
        };
        assert!(errors.iter().any(|e| e.contains("at least one trigger node")));
        assert!(errors.iter().any(|e| e.contains("ghost")));
        assert!(errors.iter().any(|e| e.contains("requires a channel")));
        assert!(service.list_workflows().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn invalid_update_leaves_workflow_untouched() {
        let service = service();
        let workflow = service.create_workflow(order_flow()).await.expect("create");

        let draft = WorkflowDraft::new("broken")
            .with_status(WorkflowStatus::Active)
            .with_node(NodeSpec::action("step", "crm.unknown"))
            .with_edge("step", "ghost");
        let err = service
            .update_workflow(workflow.id(), draft)
            .await
            .unwrap_err();
        let WorkflowError::InvalidGraph { errors } = err.current_context() else {
            panic!("expected invalid graph");
        };
        assert!(errors.contains(&"Unknown action type: crm.unknown".to_string()));

        let stored = service
            .get_workflow(workflow.id())
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored, workflow);
    }

    #[tokio::test]
    async fn update_replaces_graph_and_respects_status_rules() {
        let service = service();
        let workflow = service.create_workflow(order_flow()).await.expect("create");

        let draft = WorkflowDraft::new("Renamed")
            .with_node(NodeSpec::trigger("start", "customers.segmented"))
            .with_node(
                NodeSpec::action("hook", "webhooks.invoke")
                    .with_config("url", "https://hooks.example.com/vip"),
            )
            .with_edge("start", "hook");
        let updated = service
            .update_workflow(workflow.id(), draft.clone())
            .await
            .expect("update")
            .expect("present");
        assert_eq!(updated.definition.name, "Renamed");
        assert_eq!(updated.status(), WorkflowStatus::Draft);
        assert_eq!(updated.nodes.len(), 2);
        assert!(updated.nodes.iter().all(|n| workflow.nodes.iter().all(|old| old.id != n.id)));
        assert_eq!(updated.definition.metadata.trigger_types, vec!["customers.segmented"]);

        let err = service
            .update_workflow(
                workflow.id(),
                draft.clone().with_status(WorkflowStatus::Archived),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            WorkflowError::InvalidStateTransition { .. }
        ));

        service.delete_workflow(workflow.id()).await.expect("delete");
        let err = service
            .update_workflow(workflow.id(), draft)
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            WorkflowError::InvalidStateTransition { from, .. } if from == "archived"
        ));
    }

    #[tokio::test]
    async fn missing_workflows_are_none() {
        let service = service();
        let id = WorkflowId::new();
        assert!(service.get_workflow(id).await.expect("get").is_none());
        assert!(service.delete_workflow(id).await.expect("delete").is_none());
        assert!(service.validate_workflow(id).await.expect("validate").is_none());
        assert!(
            service
                .update_workflow(id, order_flow())
                .await
                .expect("update")
                .is_none()
        );
        assert!(
            service
                .simulate_workflow(id, "orders.created", &json!({ "orderId": "o1" }))
                .await
                .expect("simulate")
                .is_none()
        );
        assert!(
            service
                .get_execution(ExecutionId::new())
                .await
                .expect("get")
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_archives_and_keeps_history() {
        let service = service();
        let workflow = service.create_workflow(order_flow()).await.expect("create");
        service
            .run_trigger("orders.created", &json!({ "orderId": "o1" }))
            .await
            .expect("run");

        let archived = service
            .delete_workflow(workflow.id())
            .await
            .expect("delete")
            .expect("present");
        assert_eq!(archived.status, WorkflowStatus::Archived);
        assert!(archived.archived_at.is_some());

        let again = service
            .delete_workflow(workflow.id())
            .await
            .expect("delete")
            .expect("present");
        assert_eq!(again.archived_at, archived.archived_at);

        assert_eq!(service.list_executions(workflow.id()).await.expect("list").len(), 1);
        let reports = service
            .run_trigger("orders.created", &json!({ "orderId": "o2" }))
            .await
            .expect("run");
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn simulation_leaves_no_trace() {
        let service = service();
        let workflow = service
            .create_workflow(order_flow().with_status(WorkflowStatus::Draft))
            .await
            .expect("create");
        service.delete_workflow(workflow.id()).await.expect("archive");

        let report = service
            .simulate_workflow(workflow.id(), "orders.created", &json!({ "orderId": "o1", "total": 42 }))
            .await
            .expect("simulate")
            .expect("present");
        assert_eq!(report.status, ExecutionStatus::Completed);
        assert!(report.execution_id.is_none());
        assert_eq!(report.context.get("crm:lifetime_value"), Some(&json!(42)));
        assert!(service.list_executions(workflow.id()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn unknown_trigger_type_is_a_hard_error() {
        let service = service();
        let workflow = service.create_workflow(order_flow()).await.expect("create");

        let err = service
            .run_trigger("invoices.paid", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            WorkflowError::Trigger(TriggerError::Unknown { .. })
        ));

        let err = service
            .simulate_workflow(workflow.id(), "invoices.paid", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            WorkflowError::Trigger(TriggerError::Unknown { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_any_run() {
        let service = service();
        let workflow = service.create_workflow(order_flow()).await.expect("create");

        let err = service
            .run_trigger("orders.created", &json!({ "total": 42 }))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            WorkflowError::Trigger(TriggerError::InvalidPayload { .. })
        ));
        assert!(service.list_executions(workflow.id()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn mismatched_trigger_records_no_trigger() {
        let service = service();
        let workflow = service
            .create_workflow(
                WorkflowDraft::new("segments")
                    .with_node(NodeSpec::trigger("start", "customers.segmented"))
                    .with_node(
                        NodeSpec::action("notify", "notifications.dispatch")
                            .with_config("channel", "push"),
                    )
                    .with_edge("start", "notify"),
            )
            .await
            .expect("create");

        let report = service
            .simulate_workflow(workflow.id(), "orders.created", &json!({ "orderId": "o1" }))
            .await
            .expect("simulate")
            .expect("present");
        assert_eq!(report.status, ExecutionStatus::Failed);
        assert_eq!(report.logs.len(), 1);
        assert_eq!(report.logs[0].event_type, ExecutionEventType::NoTrigger);
    }

    #[tokio::test]
    async fn failed_run_does_not_stop_other_workflows() {
        let service = service();
        let failing = service
            .create_workflow(flaky_flow("first", "fail"))
            .await
            .expect("create");
        let passing = service
            .create_workflow(flaky_flow("second", "ok"))
            .await
            .expect("create");

        let reports = service
            .run_trigger("orders.created", &json!({ "orderId": "o1" }))
            .await
            .expect("run");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].workflow_id, failing.id());
        assert_eq!(reports[0].status, ExecutionStatus::Failed);
        assert_eq!(reports[1].workflow_id, passing.id());
        assert_eq!(reports[1].status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn fault_finalizes_execution_then_errors() {
        let service = service();
        let workflow = service
            .create_workflow(flaky_flow("faulty", "fault"))
            .await
            .expect("create");

        let err = service
            .run_trigger("orders.created", &json!({ "orderId": "o1" }))
            .await
            .unwrap_err();
        let WorkflowError::ExecutionFault { execution_id, .. } = err.current_context() else {
            panic!("expected execution fault");
        };
        let execution_id = execution_id.expect("execution id");

        let history = service
            .get_execution(execution_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(history.execution.workflow_id, workflow.id());
        assert_eq!(history.execution.status, ExecutionStatus::Failed);
        assert!(history.execution.completed_at.is_some());
        assert_eq!(
            history.events.last().map(|e| e.entry.event_type),
            Some(ExecutionEventType::Error)
        );
    }

    #[tokio::test]
    async fn simulated_fault_is_an_error_without_execution() {
        let service = service();
        let workflow = service
            .create_workflow(flaky_flow("faulty", "fault"))
            .await
            .expect("create");
        let err = service
            .simulate_workflow(workflow.id(), "orders.created", &json!({ "orderId": "o1" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            WorkflowError::ExecutionFault { execution_id: None, .. }
        ));
        assert!(service.list_executions(workflow.id()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn validate_workflow_reports_current_registry_state() {
        let service = service();
        let workflow = service
            .create_workflow(
                WorkflowDraft::new("lonely").with_node(NodeSpec::trigger("start", "orders.created")),
            )
            .await
            .expect("create");

        let report = service
            .validate_workflow(workflow.id())
            .await
            .expect("validate")
            .expect("present");
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["Workflow has no action nodes".to_string()]);

        let stricter = WorkflowService::new(Engine::builder().build(), service.store().clone());
        let report = stricter
            .validate_workflow(workflow.id())
            .await
            .expect("validate")
            .expect("present");
        assert!(!report.valid);
        assert!(report.errors.contains(&"Unknown trigger type: orders.created".to_string()));
    }

    /// Memory store whose recorders reject every write, like a dropped connection.
    #[derive(Clone)]
    struct BrokenRecorderStore(MemoryStore);

    struct BrokenRecorder;

    #[async_trait]
    impl ExecutionRecorder for BrokenRecorder {
        async fn append(&mut self, _event: WorkflowExecutionEvent) -> Result<(), StoreError> {
            Err(StoreError::Database {
                details: "event insert rejected".to_string(),
            })
        }

        async fn finish(self: Box<Self>, _execution: &WorkflowExecution) -> Result<(), StoreError> {
            Err(StoreError::Database {
                details: "connection closed".to_string(),
            })
        }
    }

    #[async_trait]
    impl WorkflowStore for BrokenRecorderStore {
        async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
            self.0.insert_workflow(workflow).await
        }

        async fn replace_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
            self.0.replace_workflow(workflow).await
        }

        async fn update_definition(
            &self,
            definition: &WorkflowDefinition,
        ) -> Result<(), StoreError> {
            self.0.update_definition(definition).await
        }

        async fn find_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
            self.0.find_workflow(id).await
        }

        async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
            self.0.list_workflows().await
        }

        async fn list_active_by_trigger(
            &self,
            trigger_type: &str,
        ) -> Result<Vec<Workflow>, StoreError> {
            self.0.list_active_by_trigger(trigger_type).await
        }

        async fn begin_execution(
            &self,
            _execution: &WorkflowExecution,
        ) -> Result<Box<dyn ExecutionRecorder>, StoreError> {
            Ok(Box::new(BrokenRecorder))
        }

        async fn find_execution(
            &self,
            id: ExecutionId,
        ) -> Result<Option<WorkflowExecution>, StoreError> {
            self.0.find_execution(id).await
        }

        async fn list_executions(
            &self,
            workflow_id: WorkflowId,
        ) -> Result<Vec<WorkflowExecution>, StoreError> {
            self.0.list_executions(workflow_id).await
        }

        async fn list_execution_events(
            &self,
            execution_id: ExecutionId,
        ) -> Result<Vec<WorkflowExecutionEvent>, StoreError> {
            self.0.list_execution_events(execution_id).await
        }
    }

    #[tokio::test]
    async fn finalize_failure_keeps_the_pending_fault() {
        let engine = builtin::register(Engine::builder(), &WebhookConfig::default())
            .expect("builtins")
            .build();
        let service = WorkflowService::new(engine, BrokenRecorderStore(MemoryStore::new()));
        service.create_workflow(order_flow()).await.expect("create");

        let err = service
            .run_trigger("orders.created", &json!({ "orderId": "o1" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            WorkflowError::Store(StoreError::Database { details }) if details == "connection closed"
        ));
        let pending: Vec<_> = err
            .attachments()
            .iter()
            .filter_map(|a| a.downcast_inner::<String>())
            .collect();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].contains("event insert rejected"));
    }

    #[test]
    fn store_errors_keep_their_kind() {
        let err: WorkflowError = StoreError::Decode {
            details: "bad status".to_string(),
        }
        .into();
        assert!(matches!(err, WorkflowError::Store(StoreError::Decode { .. })));
    }
}
