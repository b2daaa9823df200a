//! Edges between workflow nodes.
//!
//! Callers describe edges by node key. Keys are resolved to node identities
//! when the graph is written, so persisted edges point at [`NodeId`]s.

use crate::node::WorkflowNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use washline_core::{EdgeId, NodeId, WorkflowId};

/// A caller-supplied edge, referencing nodes by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    /// Key of the source node.
    pub source: String,
    /// Key of the target node.
    pub target: String,
}

impl EdgeSpec {
    /// Creates a new edge spec.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A persisted edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    /// Identity assigned at write time.
    pub id: EdgeId,
    /// Owning workflow.
    pub workflow_id: WorkflowId,
    /// Source node identity.
    pub source: NodeId,
    /// Target node identity.
    pub target: NodeId,
}

impl WorkflowEdge {
    /// Creates an edge between two node identities.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::new(),
            workflow_id,
            source,
            target,
        }
    }

    /// Resolves edge specs against materialized nodes.
    ///
    /// Specs whose endpoints are not among `nodes` are dropped; the validator
    /// rejects such graphs before they reach this point.
    #[must_use]
    pub fn resolve_all(
        workflow_id: WorkflowId,
        specs: &[EdgeSpec],
        nodes: &[WorkflowNode],
    ) -> Vec<Self> {
        let by_key: HashMap<&str, NodeId> =
            nodes.iter().map(|n| (n.key.as_str(), n.id)).collect();

        specs
            .iter()
            .filter_map(|spec| {
                let source = by_key.get(spec.source.as_str())?;
                let target = by_key.get(spec.target.as_str())?;
                Some(Self::new(workflow_id, *source, *target))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeSpec;

    #[test]
    fn resolves_keys_to_identities() {
        let workflow_id = WorkflowId::new();
        let nodes: Vec<_> = [
            NodeSpec::trigger("start", "orders.created"),
            NodeSpec::action("notify", "notifications.dispatch"),
        ]
        .iter()
        .map(|s| WorkflowNode::from_spec(workflow_id, s))
        .collect();

        let edges = WorkflowEdge::resolve_all(
            workflow_id,
            &[EdgeSpec::new("start", "notify"), EdgeSpec::new("start", "ghost")],
            &nodes,
        );

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, nodes[0].id);
        assert_eq!(edges[0].target, nodes[1].id);
        assert_eq!(edges[0].workflow_id, workflow_id);
    }
}
