//! Execution records.
//!
//! A real run produces one [`WorkflowExecution`] row and an append-only,
//! sequence-ordered list of [`WorkflowExecutionEvent`]s. Simulations produce
//! neither; both kinds of run hand the caller an [`ExecutionReport`].

use crate::node::WorkflowNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use washline_core::{ExecutionEventId, ExecutionId, NodeId, WorkflowId};

/// Accumulated key/value state threaded through one run.
pub type Context = Map<String, JsonValue>;

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, not yet started.
    Pending,
    /// Traversal in progress.
    Running,
    /// Queue drained without a failure.
    Completed,
    /// An action failed, no trigger matched, or the run faulted.
    Failed,
}

impl ExecutionStatus {
    /// Returns the persisted name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a persisted status name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag of an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEventType {
    /// An action is about to run.
    NodeStarted,
    /// An action succeeded.
    ActionCompleted,
    /// An action returned a failure; the run stops.
    ActionFailed,
    /// An edge points at a node that does not exist.
    MissingNode,
    /// An action node's type is not registered.
    UnknownAction,
    /// No trigger node matched the firing trigger type.
    NoTrigger,
    /// An edge was already traversed in this run.
    EdgeSkipped,
    /// The run faulted.
    Error,
}

impl ExecutionEventType {
    /// Returns the persisted name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeStarted => "node_started",
            Self::ActionCompleted => "action_completed",
            Self::ActionFailed => "action_failed",
            Self::MissingNode => "missing_node",
            Self::UnknownAction => "unknown_action",
            Self::NoTrigger => "no_trigger",
            Self::EdgeSkipped => "edge_skipped",
            Self::Error => "error",
        }
    }

    /// Parses a persisted event type name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "node_started" => Some(Self::NodeStarted),
            "action_completed" => Some(Self::ActionCompleted),
            "action_failed" => Some(Self::ActionFailed),
            "missing_node" => Some(Self::MissingNode),
            "unknown_action" => Some(Self::UnknownAction),
            "no_trigger" => Some(Self::NoTrigger),
            "edge_skipped" => Some(Self::EdgeSkipped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One step of a run's log, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    /// What happened.
    pub event_type: ExecutionEventType,
    /// The node involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Key of the node involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_key: Option<String>,
    /// Registered type of the node involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionLogEntry {
    /// Creates an entry with no node reference.
    #[must_use]
    pub fn new(event_type: ExecutionEventType) -> Self {
        Self {
            event_type,
            node_id: None,
            node_key: None,
            node_type: None,
            message: None,
            payload: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches a node reference.
    #[must_use]
    pub fn for_node(mut self, node: &WorkflowNode) -> Self {
        self.node_id = Some(node.id);
        self.node_key = Some(node.key.clone());
        self.node_type = Some(node.node_type.clone());
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the structured payload.
    #[must_use]
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A persisted log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionEvent {
    /// Event identity.
    pub id: ExecutionEventId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Position within the execution, starting at 0.
    pub sequence: i64,
    /// The entry itself.
    #[serde(flatten)]
    pub entry: ExecutionLogEntry,
}

impl WorkflowExecutionEvent {
    /// Wraps a log entry for persistence.
    #[must_use]
    pub fn new(execution_id: ExecutionId, sequence: i64, entry: ExecutionLogEntry) -> Self {
        Self {
            id: ExecutionEventId::new(),
            execution_id,
            sequence,
            entry,
        }
    }
}

/// The record of one real run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    /// Execution identity.
    pub id: ExecutionId,
    /// Workflow that ran.
    pub workflow_id: WorkflowId,
    /// Firing trigger type.
    pub trigger_type: String,
    /// Current status.
    pub status: ExecutionStatus,
    /// Trigger payload as received.
    pub payload: JsonValue,
    /// Context at completion.
    pub context: Context,
    /// When traversal started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Creates a pending execution.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, trigger_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            trigger_type: trigger_type.into(),
            status: ExecutionStatus::Pending,
            payload,
            context: Context::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Moves the execution to running.
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Records the final status and context.
    pub fn finish(&mut self, status: ExecutionStatus, context: Context) {
        self.status = status;
        self.context = context;
        self.completed_at = Some(Utc::now());
    }

    /// Returns the run duration in milliseconds, once finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        let start = self.started_at?;
        let end = self.completed_at?;
        Some((end - start).num_milliseconds())
    }
}

/// An execution together with its ordered events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHistory {
    /// The execution row.
    #[serde(flatten)]
    pub execution: WorkflowExecution,
    /// Its events, by sequence.
    pub events: Vec<WorkflowExecutionEvent>,
}

/// What a caller gets back from a run or a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Persisted execution, absent for simulations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// Workflow that ran.
    pub workflow_id: WorkflowId,
    /// Final status.
    pub status: ExecutionStatus,
    /// Ordered log.
    pub logs: Vec<ExecutionLogEntry>,
    /// Final context.
    pub context: Context,
    /// Wall-clock duration of the traversal.
    pub duration_ms: i64,
}

impl ExecutionReport {
    /// Returns the log entries of one type, in order.
    pub fn entries(&self, event_type: ExecutionEventType) -> impl Iterator<Item = &ExecutionLogEntry> {
        self.logs.iter().filter(move |e| e.event_type == event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn execution_lifecycle() {
        let mut execution = WorkflowExecution::new(WorkflowId::new(), "orders.created", json!({}));
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert!(execution.duration_ms().is_none());

        execution.start();
        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(!execution.status.is_terminal());

        let mut context = Context::new();
        context.insert("x".to_string(), json!(1));
        execution.finish(ExecutionStatus::Completed, context);
        assert!(execution.status.is_terminal());
        assert_eq!(execution.context.get("x"), Some(&json!(1)));
        assert!(execution.duration_ms().is_some_and(|ms| ms >= 0));
    }

    #[test]
    fn event_type_names_round_trip() {
        for event_type in [
            ExecutionEventType::NodeStarted,
            ExecutionEventType::ActionCompleted,
            ExecutionEventType::ActionFailed,
            ExecutionEventType::MissingNode,
            ExecutionEventType::UnknownAction,
            ExecutionEventType::NoTrigger,
            ExecutionEventType::EdgeSkipped,
            ExecutionEventType::Error,
        ] {
            assert_eq!(ExecutionEventType::parse(event_type.as_str()), Some(event_type));
            let json = serde_json::to_value(event_type).expect("serialize");
            assert_eq!(json, json!(event_type.as_str()));
        }
    }

    #[test]
    fn simulation_report_has_no_execution_id_field() {
        let report = ExecutionReport {
            execution_id: None,
            workflow_id: WorkflowId::new(),
            status: ExecutionStatus::Completed,
            logs: vec![ExecutionLogEntry::new(ExecutionEventType::NoTrigger)],
            context: Context::new(),
            duration_ms: 0,
        };
        let json = serde_json::to_value(&report).expect("serialize");
        assert!(json.get("executionId").is_none());
        assert_eq!(json["logs"][0]["eventType"], "no_trigger");
    }
}
