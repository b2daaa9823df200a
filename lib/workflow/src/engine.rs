//! Workflow execution engine.
//!
//! The engine owns the trigger and action registries. They are filled
//! through [`EngineBuilder`] and never change afterwards, so independent
//! engines (one per test, say) never share state.
//!
//! Traversal is a FIFO walk over edges starting at the trigger nodes that
//! match the firing trigger type. Each edge is followed at most once per
//! run; a repeat is logged as `edge_skipped`. A node reachable through
//! several distinct edges runs once per edge. The first action failure or
//! fault stops the whole run.

use crate::action::{Action, ActionCatalogEntry, ActionInvocation, ActionRegistry, TriggerInfo};
use crate::definition::Workflow;
use crate::edge::{EdgeSpec, WorkflowEdge};
use crate::error::{ActionError, StoreError, TriggerError};
use crate::execution::{Context, ExecutionEventType, ExecutionLogEntry, ExecutionReport, ExecutionStatus};
use crate::graph::{self, ValidationReport};
use crate::node::{NodeSpec, WorkflowNode};
use crate::sink::ExecutionSink;
use crate::trigger::{TriggerCatalogEntry, TriggerDefinition, TriggerRegistry};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, warn};
use washline_core::{EdgeId, ExecutionId, NodeId, WorkflowId};

/// Everything the engine knows how to run, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    /// Registered triggers, ordered by type.
    pub triggers: Vec<TriggerCatalogEntry>,
    /// Registered actions, ordered by type.
    pub actions: Vec<ActionCatalogEntry>,
}

/// A trigger firing whose payload has been checked and whose context is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTrigger {
    /// The firing trigger type.
    pub trigger_type: String,
    /// Label of the trigger registration.
    pub label: String,
    /// Initial run context.
    pub context: Context,
}

impl PreparedTrigger {
    /// Builds the trigger metadata handed to actions of one run.
    #[must_use]
    pub fn info(&self, workflow_id: WorkflowId, execution_id: Option<ExecutionId>) -> TriggerInfo {
        TriggerInfo {
            trigger_type: self.trigger_type.clone(),
            label: self.label.clone(),
            workflow_id,
            execution_id,
        }
    }
}

/// Why a run ended abnormally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFault {
    /// An action returned an error instead of a result.
    Action { node_key: String, error: ActionError },
    /// The sink could not record an event.
    Sink(StoreError),
}

impl fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action { node_key, error } => write!(f, "node '{node_key}': {error}"),
            Self::Sink(e) => write!(f, "failed to record execution event: {e}"),
        }
    }
}

impl std::error::Error for ExecutionFault {}

/// Result of one traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Completed or failed.
    pub status: ExecutionStatus,
    /// Every log entry, in order.
    pub logs: Vec<ExecutionLogEntry>,
    /// Final context, including patches from actions that ran before a failure.
    pub context: Context,
    /// Wall-clock duration of the traversal.
    pub duration_ms: i64,
    /// Set when the run faulted rather than failing normally.
    pub fault: Option<ExecutionFault>,
}

impl ExecutionOutcome {
    /// Converts the outcome into the caller-facing report.
    #[must_use]
    pub fn into_report(
        self,
        workflow_id: WorkflowId,
        execution_id: Option<ExecutionId>,
    ) -> ExecutionReport {
        ExecutionReport {
            execution_id,
            workflow_id,
            status: self.status,
            logs: self.logs,
            context: self.context,
            duration_ms: self.duration_ms,
        }
    }
}

/// Collects registrations before an [`Engine`] is built.
#[derive(Debug, Default)]
pub struct EngineBuilder {
    triggers: TriggerRegistry,
    actions: ActionRegistry,
}

impl EngineBuilder {
    /// Creates a builder with empty registries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trigger. A later registration of the same type wins.
    #[must_use]
    pub fn trigger(mut self, definition: TriggerDefinition) -> Self {
        if let Some(previous) = self.triggers.register(definition) {
            debug!(trigger_type = %previous.trigger_type, "trigger registration replaced");
        }
        self
    }

    /// Registers an action. A later registration of the same type wins.
    #[must_use]
    pub fn action(mut self, action: impl Action + 'static) -> Self {
        if let Some(previous) = self.actions.register(action) {
            debug!(action_type = %previous.action_type(), "action registration replaced");
        }
        self
    }

    /// Freezes the registries.
    #[must_use]
    pub fn build(self) -> Engine {
        Engine {
            triggers: self.triggers,
            actions: self.actions,
        }
    }
}

/// Validates and runs workflow graphs against fixed registries.
#[derive(Debug, Clone)]
pub struct Engine {
    triggers: TriggerRegistry,
    actions: ActionRegistry,
}

impl Engine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The trigger registry.
    #[must_use]
    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    /// The action registry.
    #[must_use]
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Lists every registered trigger and action.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Catalog {
            triggers: self
                .triggers
                .list()
                .map(TriggerDefinition::catalog_entry)
                .collect(),
            actions: self.actions.catalog(),
        }
    }

    /// Validates a graph against this engine's registries.
    #[must_use]
    pub fn validate(&self, nodes: &[NodeSpec], edges: &[EdgeSpec]) -> ValidationReport {
        graph::validate(&self.triggers, &self.actions, nodes, edges)
    }

    /// Checks a payload and resolves the initial context for a trigger firing.
    ///
    /// The initial context holds the payload object's top-level fields with
    /// the resolver's entries merged over them.
    ///
    /// # Errors
    ///
    /// Fails if the trigger type is unregistered, the payload does not match
    /// its schema, or the resolver fails.
    pub async fn prepare_trigger(
        &self,
        trigger_type: &str,
        payload: &JsonValue,
    ) -> Result<PreparedTrigger, TriggerError> {
        let definition = self
            .triggers
            .get(trigger_type)
            .ok_or_else(|| TriggerError::Unknown {
                trigger_type: trigger_type.to_string(),
            })?;
        definition.check_payload(payload)?;
        let resolved = definition.resolver.resolve(payload).await?;

        let mut context = payload.as_object().cloned().unwrap_or_default();
        context.extend(resolved);
        Ok(PreparedTrigger {
            trigger_type: definition.trigger_type.clone(),
            label: definition.label.clone(),
            context,
        })
    }

    /// Walks a workflow's graph for one trigger firing.
    ///
    /// Never fails: action failures and faults end the run as `failed`, with
    /// faults also reported in [`ExecutionOutcome::fault`].
    pub async fn execute(
        &self,
        workflow: &Workflow,
        trigger: &TriggerInfo,
        payload: &JsonValue,
        context: Context,
        sink: &mut dyn ExecutionSink,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let mut run = Traversal::new(self, workflow, trigger, payload, context, sink);
        let status = run.walk().await;
        let elapsed = started.elapsed().as_millis();
        ExecutionOutcome {
            status,
            logs: run.logs,
            context: run.context,
            duration_ms: i64::try_from(elapsed).unwrap_or(i64::MAX),
            fault: run.fault,
        }
    }
}

/// State of one run.
struct Traversal<'a> {
    engine: &'a Engine,
    workflow: &'a Workflow,
    trigger: &'a TriggerInfo,
    payload: &'a JsonValue,
    sink: &'a mut dyn ExecutionSink,
    nodes: HashMap<NodeId, &'a WorkflowNode>,
    outgoing: HashMap<NodeId, Vec<&'a WorkflowEdge>>,
    context: Context,
    logs: Vec<ExecutionLogEntry>,
    fault: Option<ExecutionFault>,
}

impl<'a> Traversal<'a> {
    fn new(
        engine: &'a Engine,
        workflow: &'a Workflow,
        trigger: &'a TriggerInfo,
        payload: &'a JsonValue,
        context: Context,
        sink: &'a mut dyn ExecutionSink,
    ) -> Self {
        let nodes = workflow.nodes.iter().map(|n| (n.id, n)).collect();
        let mut outgoing: HashMap<NodeId, Vec<&WorkflowEdge>> = HashMap::new();
        for edge in &workflow.edges {
            outgoing.entry(edge.source).or_default().push(edge);
        }
        Self {
            engine,
            workflow,
            trigger,
            payload,
            sink,
            nodes,
            outgoing,
            context,
            logs: Vec::new(),
            fault: None,
        }
    }

    fn edges_from(&self, node: NodeId) -> Vec<&'a WorkflowEdge> {
        self.outgoing.get(&node).cloned().unwrap_or_default()
    }

    /// Records an entry. On a sink failure the run faults.
    async fn log(&mut self, entry: ExecutionLogEntry) -> bool {
        let recorded = self.sink.record(&entry).await;
        self.logs.push(entry);
        match recorded {
            Ok(()) => true,
            Err(e) => {
                error!(workflow_id = %self.workflow.id(), error = %e, "failed to record execution event");
                self.fault = Some(ExecutionFault::Sink(e));
                false
            }
        }
    }

    async fn walk(&mut self) -> ExecutionStatus {
        let workflow = self.workflow;
        let workflow_id = workflow.id();
        let trigger = self.trigger;
        let trigger_type = trigger.trigger_type.as_str();

        let mut queue: VecDeque<&'a WorkflowEdge> = VecDeque::new();
        let mut matched = 0usize;
        for node in workflow
            .nodes
            .iter()
            .filter(|n| n.is_trigger() && n.node_type == trigger_type)
        {
            matched += 1;
            queue.extend(self.edges_from(node.id));
        }

        if matched == 0 {
            warn!(%workflow_id, trigger_type, "no trigger node matches");
            self.log(
                ExecutionLogEntry::new(ExecutionEventType::NoTrigger)
                    .with_message(format!("No trigger node of type {trigger_type}")),
            )
            .await;
            return ExecutionStatus::Failed;
        }

        let mut visited: HashSet<EdgeId> = HashSet::new();
        while let Some(edge) = queue.pop_front() {
            if !visited.insert(edge.id) {
                debug!(%workflow_id, edge_id = %edge.id, "edge already traversed");
                let entry = ExecutionLogEntry::new(ExecutionEventType::EdgeSkipped)
                    .with_message("Edge already traversed in this run")
                    .with_payload(json!({
                        "edgeId": edge.id.to_string(),
                        "source": edge.source.to_string(),
                        "target": edge.target.to_string(),
                    }));
                if !self.log(entry).await {
                    return ExecutionStatus::Failed;
                }
                continue;
            }

            let Some(node) = self.nodes.get(&edge.target).copied() else {
                warn!(%workflow_id, edge_id = %edge.id, target = %edge.target, "edge target missing");
                let entry = ExecutionLogEntry::new(ExecutionEventType::MissingNode)
                    .with_message(format!("Node {} not found", edge.target))
                    .with_payload(json!({
                        "edgeId": edge.id.to_string(),
                        "target": edge.target.to_string(),
                    }));
                if !self.log(entry).await {
                    return ExecutionStatus::Failed;
                }
                continue;
            };

            if node.is_trigger() {
                debug!(%workflow_id, node_key = %node.key, "passing through trigger node");
                queue.extend(self.edges_from(node.id));
                continue;
            }

            let Some(action) = self.engine.actions.get(&node.node_type).cloned() else {
                warn!(%workflow_id, node_key = %node.key, action_type = %node.node_type, "unknown action type");
                let entry = ExecutionLogEntry::new(ExecutionEventType::UnknownAction)
                    .for_node(node)
                    .with_message(format!("Unknown action type: {}", node.node_type));
                if !self.log(entry).await {
                    return ExecutionStatus::Failed;
                }
                continue;
            };

            debug!(%workflow_id, node_key = %node.key, action_type = %node.node_type, "running action");
            if !self
                .log(ExecutionLogEntry::new(ExecutionEventType::NodeStarted).for_node(node))
                .await
            {
                return ExecutionStatus::Failed;
            }

            let invocation = ActionInvocation {
                node,
                context: &self.context,
                payload: self.payload,
                trigger: self.trigger,
                mode: self.sink.mode(),
            };
            let result = match action.run(invocation).await {
                Ok(result) => result,
                Err(e) => {
                    error!(%workflow_id, node_key = %node.key, error = %e, "action faulted");
                    let entry = ExecutionLogEntry::new(ExecutionEventType::Error)
                        .for_node(node)
                        .with_message(e.to_string());
                    self.fault = Some(ExecutionFault::Action {
                        node_key: node.key.clone(),
                        error: e,
                    });
                    let recorded = self.sink.record(&entry).await;
                    self.logs.push(entry);
                    if let Err(e) = recorded {
                        error!(%workflow_id, error = %e, "failed to record fault event");
                    }
                    return ExecutionStatus::Failed;
                }
            };

            let patch = result.context_patch.clone();
            if let Some(patch) = &patch {
                self.context
                    .extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
            }

            if result.is_failure() {
                let reason = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Action failed".to_string());
                warn!(%workflow_id, node_key = %node.key, reason = %reason, "action failed");
                self.log(
                    ExecutionLogEntry::new(ExecutionEventType::ActionFailed)
                        .for_node(node)
                        .with_message(reason),
                )
                .await;
                return ExecutionStatus::Failed;
            }

            let mut entry = ExecutionLogEntry::new(ExecutionEventType::ActionCompleted).for_node(node);
            if let Some(message) = result.message {
                entry = entry.with_message(message);
            }
            if let Some(patch) = patch {
                entry = entry.with_payload(JsonValue::Object(patch));
            }
            if !self.log(entry).await {
                return ExecutionStatus::Failed;
            }
            queue.extend(self.edges_from(node.id));
        }

        ExecutionStatus::Completed
    }
}
