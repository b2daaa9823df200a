//! Action registry.
//!
//! Actions are the side-effecting steps of a workflow. Each implementation
//! registers under a type string and owns the decoding of its node's
//! configuration map.
//!
//! Simulation runs still call [`Action::run`], with
//! [`ActionInvocation::is_simulation`] set. The registry does not stop an
//! action from causing side effects during a simulation; implementations
//! that touch the outside world check the flag themselves.

use crate::error::ActionError;
use crate::execution::Context;
use crate::node::{NodeSpec, WorkflowNode};
use crate::sink::RunMode;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use washline_core::{ExecutionId, WorkflowId};

/// Details about the trigger firing that started a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    /// The firing trigger type.
    pub trigger_type: String,
    /// Display label of the trigger registration.
    pub label: String,
    /// The workflow being run.
    pub workflow_id: WorkflowId,
    /// The persisted execution, absent for simulations.
    pub execution_id: Option<ExecutionId>,
}

/// Everything an action sees when it runs.
#[derive(Debug, Clone, Copy)]
pub struct ActionInvocation<'a> {
    /// The node being executed.
    pub node: &'a WorkflowNode,
    /// The accumulated context before this step.
    pub context: &'a Context,
    /// The original trigger payload.
    pub payload: &'a JsonValue,
    /// Trigger metadata.
    pub trigger: &'a TriggerInfo,
    /// Live or simulated.
    pub mode: RunMode,
}

impl ActionInvocation<'_> {
    /// Returns true for dry runs.
    #[must_use]
    pub fn is_simulation(&self) -> bool {
        self.mode == RunMode::Simulation
    }
}

/// Outcome class of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The step succeeded; traversal continues.
    Success,
    /// The step failed; the run stops.
    Failure,
}

/// What an action returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    /// Success or failure.
    pub status: ActionStatus,
    /// Entries merged into the context (shallow, last write wins).
    pub context_patch: Option<Context>,
    /// Human-readable detail.
    pub message: Option<String>,
    /// Error description for failures.
    pub error: Option<String>,
}

impl ActionResult {
    /// A successful result with no patch.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: ActionStatus::Success,
            context_patch: None,
            message: None,
            error: None,
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failure,
            context_patch: None,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Adds one context entry to the patch.
    #[must_use]
    pub fn with_patch(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.context_patch
            .get_or_insert_with(Context::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns true for failures.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == ActionStatus::Failure
    }
}

/// A side-effecting workflow step.
#[async_trait]
pub trait Action: Send + Sync {
    /// Registry key.
    fn action_type(&self) -> &str;

    /// Display label.
    fn label(&self) -> &str;

    /// Catalog description.
    fn description(&self) -> &str {
        ""
    }

    /// Whether `run` avoids real side effects when simulating.
    fn supports_simulation(&self) -> bool {
        false
    }

    /// Checks a node's configuration without executing anything.
    ///
    /// Only consulted by the graph validator. Returned strings are reported verbatim.
    fn validate(&self, _node: &NodeSpec) -> Vec<String> {
        Vec::new()
    }

    /// Performs the step.
    ///
    /// Ordinary failures are returned as [`ActionResult::failure`]; `Err` is
    /// reserved for faults.
    async fn run(&self, invocation: ActionInvocation<'_>) -> Result<ActionResult, ActionError>;
}

/// An action as shown in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCatalogEntry {
    /// Registry key.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Display label.
    pub label: String,
    /// Description.
    pub description: String,
    /// Whether the action is safe to simulate.
    pub supports_simulation: bool,
}

/// Lookup table of action types.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under its own type, replacing any earlier registration.
    pub fn register(&mut self, action: impl Action + 'static) -> Option<Arc<dyn Action>> {
        let action: Arc<dyn Action> = Arc::new(action);
        self.actions.insert(action.action_type().to_string(), action)
    }

    /// Looks up an action type.
    #[must_use]
    pub fn get(&self, action_type: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(action_type)
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, action_type: &str) -> bool {
        self.actions.contains_key(action_type)
    }

    /// Lists catalog entries, ordered by type.
    #[must_use]
    pub fn catalog(&self) -> Vec<ActionCatalogEntry> {
        self.actions
            .values()
            .map(|a| ActionCatalogEntry {
                action_type: a.action_type().to_string(),
                label: a.label().to_string(),
                description: a.description().to_string(),
                supports_simulation: a.supports_simulation(),
            })
            .collect()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed {
        action_type: &'static str,
        label: &'static str,
    }

    #[async_trait]
    impl Action for Fixed {
        fn action_type(&self) -> &str {
            self.action_type
        }

        fn label(&self) -> &str {
            self.label
        }

        async fn run(&self, _invocation: ActionInvocation<'_>) -> Result<ActionResult, ActionError> {
            Ok(ActionResult::success())
        }
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = ActionRegistry::new();
        registry.register(Fixed {
            action_type: "crm.update_field",
            label: "old",
        });
        let replaced = registry.register(Fixed {
            action_type: "crm.update_field",
            label: "new",
        });

        assert_eq!(replaced.map(|a| a.label().to_string()), Some("old".to_string()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.catalog()[0].label, "new");
        assert!(!registry.catalog()[0].supports_simulation);
    }

    #[test]
    fn result_builders_accumulate_patch() {
        let result = ActionResult::success()
            .with_patch("a", 1)
            .with_patch("b", "two")
            .with_message("done");
        let patch = result.context_patch.expect("patch");
        assert_eq!(patch.get("a"), Some(&json!(1)));
        assert_eq!(patch.get("b"), Some(&json!("two")));
        assert_eq!(result.message.as_deref(), Some("done"));

        let failed = ActionResult::failure("nope");
        assert!(failed.is_failure());
        assert_eq!(failed.error.as_deref(), Some("nope"));
    }
}
