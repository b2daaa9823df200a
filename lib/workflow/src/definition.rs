//! Workflow definitions.
//!
//! A workflow is a named automation consisting of:
//! - A definition row (name, status, denormalized metadata, timestamps)
//! - The nodes and edges of its graph
//!
//! Definitions are archived rather than deleted so execution history keeps
//! pointing at something.

use crate::edge::{EdgeSpec, WorkflowEdge};
use crate::node::{NodeKind, NodeSpec, WorkflowNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use washline_core::WorkflowId;

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Being edited; never fired by `run_trigger`.
    #[default]
    Draft,
    /// Fired by matching trigger events.
    Active,
    /// Soft-deleted. Terminal.
    Archived,
}

impl WorkflowStatus {
    /// Returns the persisted name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    /// Parses a persisted status name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Returns true if a definition may move from `self` to `next` through an update.
    ///
    /// Archival only happens through delete, and nothing leaves `Archived`.
    #[must_use]
    pub fn can_update_to(&self, next: Self) -> bool {
        !matches!(self, Self::Archived) && !matches!(next, Self::Archived)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized index of the types a workflow's graph uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    /// Distinct trigger types, sorted.
    pub trigger_types: Vec<String>,
    /// Distinct action types, sorted.
    pub action_types: Vec<String>,
}

impl WorkflowMetadata {
    /// Recomputes the metadata from a node set.
    #[must_use]
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a NodeSpec>) -> Self {
        let mut triggers = BTreeSet::new();
        let mut actions = BTreeSet::new();
        for node in nodes {
            match node.kind {
                NodeKind::Trigger => triggers.insert(node.node_type.clone()),
                NodeKind::Action => actions.insert(node.node_type.clone()),
            };
        }
        Self {
            trigger_types: triggers.into_iter().collect(),
            action_types: actions.into_iter().collect(),
        }
    }
}

/// The definition row of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Workflow identity.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Denormalized trigger/action type lists.
    pub metadata: WorkflowMetadata,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last updated.
    pub updated_at: DateTime<Utc>,
    /// When archived, if archived.
    pub archived_at: Option<DateTime<Utc>>,
}

impl WorkflowDefinition {
    /// Creates a definition from a draft.
    #[must_use]
    pub fn from_draft(draft: &WorkflowDraft) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            status: draft.status,
            metadata: WorkflowMetadata::from_nodes(&draft.nodes),
            created_at: now,
            updated_at: now,
            archived_at: None,
        }
    }

    /// Applies a draft's fields and bumps `updated_at`.
    pub fn apply_draft(&mut self, draft: &WorkflowDraft) {
        self.name = draft.name.clone();
        self.description = draft.description.clone();
        self.status = draft.status;
        self.metadata = WorkflowMetadata::from_nodes(&draft.nodes);
        self.updated_at = Utc::now();
    }

    /// Archives the definition. Already archived definitions are left untouched.
    pub fn archive(&mut self) {
        if self.status == WorkflowStatus::Archived {
            return;
        }
        let now = Utc::now();
        self.status = WorkflowStatus::Archived;
        self.archived_at = Some(now);
        self.updated_at = now;
    }
}

/// What a caller submits to create or update a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDraft {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Requested status.
    #[serde(default)]
    pub status: WorkflowStatus,
    /// Complete node set.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    /// Complete edge set.
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl WorkflowDraft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Sets the requested status.
    #[must_use]
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds an edge between two node keys.
    #[must_use]
    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(EdgeSpec::new(source, target));
        self
    }
}

/// A definition hydrated with its current graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// The definition row.
    #[serde(flatten)]
    pub definition: WorkflowDefinition,
    /// Current nodes.
    pub nodes: Vec<WorkflowNode>,
    /// Current edges.
    pub edges: Vec<WorkflowEdge>,
}

impl Workflow {
    /// Materializes a draft into a fresh workflow with new identities.
    #[must_use]
    pub fn from_draft(draft: &WorkflowDraft) -> Self {
        let definition = WorkflowDefinition::from_draft(draft);
        let (nodes, edges) = materialize_graph(definition.id, draft);
        Self {
            definition,
            nodes,
            edges,
        }
    }

    /// Replaces definition fields and the whole graph from a draft.
    ///
    /// Node identities are regenerated; the graph is never diffed.
    pub fn replace_with(&mut self, draft: &WorkflowDraft) {
        self.definition.apply_draft(draft);
        let (nodes, edges) = materialize_graph(self.definition.id, draft);
        self.nodes = nodes;
        self.edges = edges;
    }

    /// Returns the workflow identity.
    #[must_use]
    pub fn id(&self) -> WorkflowId {
        self.definition.id
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> WorkflowStatus {
        self.definition.status
    }

    /// Returns true if the graph has a trigger node of the given type.
    #[must_use]
    pub fn has_trigger(&self, trigger_type: &str) -> bool {
        self.nodes
            .iter()
            .any(|n| n.is_trigger() && n.node_type == trigger_type)
    }

    /// Returns the graph as caller-facing specs (keys instead of identities).
    ///
    /// Edges whose endpoints are missing from the node set are omitted.
    #[must_use]
    pub fn to_specs(&self) -> (Vec<NodeSpec>, Vec<EdgeSpec>) {
        let nodes = self.nodes.iter().map(WorkflowNode::to_spec).collect();
        let edges = self
            .edges
            .iter()
            .filter_map(|edge| {
                let source = self.nodes.iter().find(|n| n.id == edge.source)?;
                let target = self.nodes.iter().find(|n| n.id == edge.target)?;
                Some(EdgeSpec::new(source.key.clone(), target.key.clone()))
            })
            .collect();
        (nodes, edges)
    }
}

fn materialize_graph(
    workflow_id: WorkflowId,
    draft: &WorkflowDraft,
) -> (Vec<WorkflowNode>, Vec<WorkflowEdge>) {
    let nodes: Vec<WorkflowNode> = draft
        .nodes
        .iter()
        .map(|spec| WorkflowNode::from_spec(workflow_id, spec))
        .collect();
    let edges = WorkflowEdge::resolve_all(workflow_id, &draft.edges, &nodes);
    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_draft() -> WorkflowDraft {
        WorkflowDraft::new("Order follow-up")
            .with_node(NodeSpec::trigger("start", "orders.created"))
            .with_node(NodeSpec::action("notify", "notifications.dispatch"))
            .with_node(NodeSpec::action("crm", "crm.update_field"))
            .with_node(NodeSpec::action("notify-again", "notifications.dispatch"))
            .with_edge("start", "notify")
            .with_edge("notify", "crm")
    }

    #[test]
    fn metadata_is_sorted_and_deduplicated() {
        let draft = order_draft();
        let metadata = WorkflowMetadata::from_nodes(&draft.nodes);
        assert_eq!(metadata.trigger_types, vec!["orders.created"]);
        assert_eq!(
            metadata.action_types,
            vec!["crm.update_field", "notifications.dispatch"]
        );
    }

    #[test]
    fn materialized_graph_round_trips_to_specs() {
        let draft = order_draft();
        let workflow = Workflow::from_draft(&draft);
        let (nodes, edges) = workflow.to_specs();
        assert_eq!(nodes, draft.nodes);
        assert_eq!(edges, draft.edges);
        assert!(workflow.nodes.iter().all(|n| n.workflow_id == workflow.id()));
    }

    #[test]
    fn replace_regenerates_node_identities() {
        let draft = order_draft();
        let mut workflow = Workflow::from_draft(&draft);
        let old_ids: Vec<_> = workflow.nodes.iter().map(|n| n.id).collect();

        workflow.replace_with(&draft.clone().with_status(WorkflowStatus::Active));

        assert_eq!(workflow.status(), WorkflowStatus::Active);
        assert!(workflow.nodes.iter().all(|n| !old_ids.contains(&n.id)));
        assert_eq!(workflow.edges.len(), 2);
    }

    #[test]
    fn archive_is_terminal_and_idempotent() {
        let mut definition = WorkflowDefinition::from_draft(&order_draft());
        definition.archive();
        let archived_at = definition.archived_at;
        assert!(archived_at.is_some());

        definition.archive();
        assert_eq!(definition.archived_at, archived_at);
        assert!(!definition.status.can_update_to(WorkflowStatus::Active));
    }

    #[test]
    fn update_cannot_request_archival() {
        assert!(WorkflowStatus::Draft.can_update_to(WorkflowStatus::Active));
        assert!(WorkflowStatus::Active.can_update_to(WorkflowStatus::Draft));
        assert!(!WorkflowStatus::Active.can_update_to(WorkflowStatus::Archived));
    }

    #[test]
    fn has_trigger_matches_type() {
        let workflow = Workflow::from_draft(&order_draft());
        assert!(workflow.has_trigger("orders.created"));
        assert!(!workflow.has_trigger("customers.segmented"));
        assert!(!workflow.has_trigger("notifications.dispatch"));
    }
}
