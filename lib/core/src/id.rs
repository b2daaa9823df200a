//! Identifiers for workflow entities.
//!
//! Every identifier wraps a ULID so that ids sort by creation time. The
//! textual form carries a short type prefix (`wf_01H...`), which is also the
//! form persisted in the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when an identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The identifier type that failed to parse.
    pub id_type: &'static str,
    /// Why parsing failed.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a fresh identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Wraps an existing ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the display prefix for this identifier type.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            /// Accepts both the prefixed form and a bare ULID.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

define_id!(
    /// Identifies a workflow definition.
    WorkflowId,
    "wf"
);

define_id!(
    /// Identifies a persisted node within a workflow graph.
    NodeId,
    "node"
);

define_id!(
    /// Identifies a persisted edge within a workflow graph.
    EdgeId,
    "edge"
);

define_id!(
    /// Identifies one real (non-simulated) workflow execution.
    ExecutionId,
    "exec"
);

define_id!(
    /// Identifies a single entry in an execution's event log.
    ExecutionEventId,
    "evt"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        assert!(WorkflowId::new().to_string().starts_with("wf_"));
        assert!(NodeId::new().to_string().starts_with("node_"));
        assert!(ExecutionId::new().to_string().starts_with("exec_"));
    }

    #[test]
    fn parses_prefixed_and_bare_forms() {
        let id = ExecutionId::new();
        let parsed: ExecutionId = id.to_string().parse().expect("prefixed");
        assert_eq!(parsed, id);

        let bare: ExecutionId = id.as_ulid().to_string().parse().expect("bare");
        assert_eq!(bare, id);
    }

    #[test]
    fn rejects_garbage() {
        let err = "wf_nope".parse::<WorkflowId>().unwrap_err();
        assert_eq!(err.id_type, "WorkflowId");
    }

    #[test]
    fn wrong_prefix_is_not_stripped() {
        let node = NodeId::new();
        assert!(node.to_string().parse::<EdgeId>().is_err());
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = WorkflowId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
        let back: WorkflowId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
