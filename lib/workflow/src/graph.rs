//! Workflow graph validation.
//!
//! Validation runs before every graph write and on demand for stored
//! workflows. Every rule is evaluated independently so a caller sees all
//! problems at once:
//! - at least one trigger node (error)
//! - at least one action node (warning)
//! - every trigger and action type registered (one error per type)
//! - node keys unique (one error per key)
//! - every edge endpoint present (one combined error)
//! - per-action configuration checks (reported verbatim)
//! - cycles (warning; traversal tolerates them)

use crate::action::ActionRegistry;
use crate::edge::EdgeSpec;
use crate::node::{NodeKind, NodeSpec};
use crate::trigger::TriggerRegistry;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Error reported when a graph has no trigger node.
pub const MISSING_TRIGGER: &str = "Workflow must have at least one trigger node";
/// Warning reported when a graph has no action node.
pub const NO_ACTIONS: &str = "Workflow has no action nodes";
/// Warning reported when a graph contains a cycle.
pub const CYCLE_DETECTED: &str = "Workflow graph contains a cycle";

/// Result of validating a workflow graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when `errors` is empty.
    pub valid: bool,
    /// Problems that block persistence.
    pub errors: Vec<String>,
    /// Problems that do not.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Validates a graph against the registries.
#[must_use]
pub fn validate(
    triggers: &TriggerRegistry,
    actions: &ActionRegistry,
    nodes: &[NodeSpec],
    edges: &[EdgeSpec],
) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !nodes.iter().any(|n| n.kind == NodeKind::Trigger) {
        errors.push(MISSING_TRIGGER.to_string());
    }
    if !nodes.iter().any(|n| n.kind == NodeKind::Action) {
        warnings.push(NO_ACTIONS.to_string());
    }

    let mut unknown_triggers = BTreeSet::new();
    let mut unknown_actions = BTreeSet::new();
    for node in nodes {
        match node.kind {
            NodeKind::Trigger if !triggers.contains(&node.node_type) => {
                unknown_triggers.insert(node.node_type.as_str());
            }
            NodeKind::Action if !actions.contains(&node.node_type) => {
                unknown_actions.insert(node.node_type.as_str());
            }
            _ => {}
        }
    }
    errors.extend(
        unknown_triggers
            .into_iter()
            .map(|t| format!("Unknown trigger type: {t}")),
    );
    errors.extend(
        unknown_actions
            .into_iter()
            .map(|t| format!("Unknown action type: {t}")),
    );

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for node in nodes {
        if !seen.insert(node.key.as_str()) {
            duplicates.insert(node.key.as_str());
        }
    }
    errors.extend(
        duplicates
            .into_iter()
            .map(|k| format!("Duplicate node key: {k}")),
    );

    let missing: BTreeSet<&str> = edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .filter(|key| !seen.contains(key))
        .collect();
    if !missing.is_empty() {
        let keys: Vec<&str> = missing.into_iter().collect();
        errors.push(format!(
            "Edges reference unknown node keys: {}",
            keys.join(", ")
        ));
    }

    for node in nodes.iter().filter(|n| n.kind == NodeKind::Action) {
        if let Some(action) = actions.get(&node.node_type) {
            errors.extend(action.validate(node));
        }
    }

    if has_cycle(nodes, edges) {
        warnings.push(CYCLE_DETECTED.to_string());
    }

    ValidationReport::from_parts(errors, warnings)
}

/// Returns true if the edges between known keys form a cycle.
fn has_cycle(nodes: &[NodeSpec], edges: &[EdgeSpec]) -> bool {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for node in nodes {
        index
            .entry(node.key.as_str())
            .or_insert_with(|| graph.add_node(node.key.as_str()));
    }
    for edge in edges {
        if let (Some(&source), Some(&target)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) {
            graph.add_edge(source, target, ());
        }
    }
    petgraph::algo::is_cyclic_directed(&graph)
}
