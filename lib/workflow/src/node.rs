//! Workflow nodes.
//!
//! A node is either a trigger (an entry point fired by a business event) or
//! an action (a side-effecting step). Its `node_type` names a registration
//! in the matching registry, and its configuration is an opaque map that
//! only the owning trigger or action knows how to decode.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use washline_core::{NodeId, WorkflowId};

/// Type-erased per-node configuration.
pub type NodeConfig = Map<String, JsonValue>;

/// Whether a node is an entry point or a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point fired by an external event.
    Trigger,
    /// Side-effecting step.
    Action,
}

impl NodeKind {
    /// Returns the persisted name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Action => "action",
        }
    }

    /// Parses a persisted kind name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "trigger" => Some(Self::Trigger),
            "action" => Some(Self::Action),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller-supplied node, before it is persisted.
///
/// `key` is chosen by the caller and must be unique within the workflow;
/// edges refer to nodes by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Caller-chosen key, unique within the workflow.
    pub key: String,
    /// Trigger or action.
    pub kind: NodeKind,
    /// Registered trigger or action type.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Opaque configuration, decoded by the owning implementation.
    #[serde(default)]
    pub config: NodeConfig,
}

impl NodeSpec {
    /// Creates a trigger node spec.
    #[must_use]
    pub fn trigger(key: impl Into<String>, trigger_type: impl Into<String>) -> Self {
        Self::new(key, NodeKind::Trigger, trigger_type)
    }

    /// Creates an action node spec.
    #[must_use]
    pub fn action(key: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self::new(key, NodeKind::Action, action_type)
    }

    fn new(key: impl Into<String>, kind: NodeKind, node_type: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            kind,
            node_type: node_type.into(),
            config: NodeConfig::new(),
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets one configuration entry.
    #[must_use]
    pub fn with_config(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.config.insert(name.into(), value.into());
        self
    }
}

/// A persisted node belonging to exactly one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Identity assigned at write time.
    pub id: NodeId,
    /// Owning workflow.
    pub workflow_id: WorkflowId,
    /// Caller-chosen key, unique within the workflow.
    pub key: String,
    /// Trigger or action.
    pub kind: NodeKind,
    /// Registered trigger or action type.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Human-readable label.
    pub label: String,
    /// Opaque configuration.
    pub config: NodeConfig,
}

impl WorkflowNode {
    /// Materializes a spec into a persisted node with a fresh identity.
    #[must_use]
    pub fn from_spec(workflow_id: WorkflowId, spec: &NodeSpec) -> Self {
        Self {
            id: NodeId::new(),
            workflow_id,
            key: spec.key.clone(),
            kind: spec.kind,
            node_type: spec.node_type.clone(),
            label: spec.label.clone(),
            config: spec.config.clone(),
        }
    }

    /// Returns true if this is a trigger node.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.kind == NodeKind::Trigger
    }

    /// Decodes the node's configuration into an implementation-owned type.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the configuration does not match `T`.
    pub fn decode_config<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        decode_config(&self.config)
    }

    /// Converts back to the key-based [`NodeSpec`] form.
    #[must_use]
    pub fn to_spec(&self) -> NodeSpec {
        NodeSpec {
            key: self.key.clone(),
            kind: self.kind,
            node_type: self.node_type.clone(),
            label: self.label.clone(),
            config: self.config.clone(),
        }
    }
}

/// Decodes an opaque configuration map into `T`.
///
/// # Errors
///
/// Returns the serde error if the map does not match `T`.
pub fn decode_config<T: DeserializeOwned>(config: &NodeConfig) -> Result<T, serde_json::Error> {
    serde_json::from_value(JsonValue::Object(config.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct ChannelOnly {
        channel: String,
    }

    #[test]
    fn spec_builders_default_label_to_key() {
        let spec = NodeSpec::action("notify", "notifications.dispatch").with_config("channel", "sms");
        assert_eq!(spec.label, "notify");
        assert_eq!(spec.kind, NodeKind::Action);
        assert_eq!(spec.config.get("channel"), Some(&json!("sms")));
    }

    #[test]
    fn kind_parses_persisted_names() {
        assert_eq!(NodeKind::parse("trigger"), Some(NodeKind::Trigger));
        assert_eq!(NodeKind::parse("action"), Some(NodeKind::Action));
        assert_eq!(NodeKind::parse("branch"), None);
    }

    #[test]
    fn node_decodes_its_own_config() {
        let spec = NodeSpec::action("n", "x").with_config("channel", "email");
        let node = WorkflowNode::from_spec(WorkflowId::new(), &spec);
        let decoded: ChannelOnly = node.decode_config().expect("decode");
        assert_eq!(decoded.channel, "email");
        assert_eq!(node.to_spec(), spec);
    }

    #[test]
    fn spec_uses_type_on_the_wire() {
        let spec: NodeSpec = serde_json::from_value(json!({
            "key": "start",
            "kind": "trigger",
            "type": "orders.created"
        }))
        .expect("deserialize");
        assert_eq!(spec.node_type, "orders.created");
        assert!(spec.config.is_empty());
        assert!(spec.label.is_empty());
    }
}
