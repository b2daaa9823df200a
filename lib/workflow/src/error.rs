//! Error types for the workflow crate.
//!
//! Errors are layered:
//! - `StoreError`: persistence failures, raised by [`WorkflowStore`](crate::store::WorkflowStore)
//!   implementations
//! - `TriggerError`: payload validation and context resolution for a firing trigger
//! - `ActionError`: an action implementation faulted instead of returning a result
//! - `WorkflowError`: facade-level errors, reported through rootcause

use std::fmt;
use washline_core::{ExecutionId, WorkflowId};

/// Errors from the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing database rejected or failed an operation.
    Database { details: String },
    /// A stored row could not be decoded into a domain value.
    Decode { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Decode { details } => write!(f, "failed to decode stored row: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors raised while preparing a trigger for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// No trigger with this type is registered.
    Unknown { trigger_type: String },
    /// The payload does not satisfy the trigger's payload schema.
    InvalidPayload {
        trigger_type: String,
        problems: Vec<String>,
    },
    /// The trigger's context resolver failed.
    ContextResolution {
        trigger_type: String,
        reason: String,
    },
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { trigger_type } => write!(f, "unknown trigger type '{trigger_type}'"),
            Self::InvalidPayload {
                trigger_type,
                problems,
            } => write!(
                f,
                "invalid payload for trigger '{trigger_type}': {}",
                problems.join("; ")
            ),
            Self::ContextResolution {
                trigger_type,
                reason,
            } => write!(
                f,
                "failed to resolve context for trigger '{trigger_type}': {reason}"
            ),
        }
    }
}

impl std::error::Error for TriggerError {}

/// An action faulted while running.
///
/// Ordinary failures are reported through
/// [`ActionResult::failure`](crate::action::ActionResult::failure); this error
/// is reserved for faults the action could not turn into a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    /// Description of the fault.
    pub message: String,
}

impl ActionError {
    /// Creates a new action error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action fault: {}", self.message)
    }
}

impl std::error::Error for ActionError {}

/// Facade-level workflow errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The submitted graph failed validation. Errors are the validator's, verbatim.
    InvalidGraph { errors: Vec<String> },
    /// The requested status change is not allowed.
    InvalidStateTransition { from: String, to: String },
    /// Firing or simulating a trigger failed before any action ran.
    Trigger(TriggerError),
    /// Storage failed.
    Store(StoreError),
    /// A run faulted. The execution record (if any) was finalized as failed.
    ExecutionFault {
        workflow_id: WorkflowId,
        execution_id: Option<ExecutionId>,
        reason: String,
    },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGraph { errors } => {
                write!(f, "workflow graph is invalid: {}", errors.join("; "))
            }
            Self::InvalidStateTransition { from, to } => {
                write!(f, "invalid state transition from {from} to {to}")
            }
            Self::Trigger(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::ExecutionFault {
                workflow_id,
                execution_id,
                reason,
            } => match execution_id {
                Some(execution_id) => write!(
                    f,
                    "execution {execution_id} of workflow {workflow_id} faulted: {reason}"
                ),
                None => write!(f, "simulation of workflow {workflow_id} faulted: {reason}"),
            },
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<TriggerError> for WorkflowError {
    fn from(e: TriggerError) -> Self {
        Self::Trigger(e)
    }
}
