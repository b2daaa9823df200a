//! Workflow automation engine for washline.
//!
//! Operators wire business events to side-effecting actions through a
//! persisted directed graph. This crate provides:
//!
//! - **Data model**: workflow definitions, trigger/action nodes, edges, executions
//! - **Registries**: trigger types with payload schemas and context resolvers,
//!   action types as [`Action`] implementations
//! - **Validation**: every graph is checked against the registries before it is stored
//! - **Execution**: a FIFO graph walk with fail-fast semantics, writing to an
//!   [`ExecutionSink`] so real runs and simulations share one algorithm
//! - **Facade**: [`WorkflowService`] over any [`WorkflowStore`]

pub mod action;
pub mod builtin;
pub mod config;
pub mod definition;
pub mod edge;
pub mod engine;
pub mod error;
pub mod execution;
pub mod graph;
pub mod node;
pub mod schema;
pub mod service;
pub mod sink;
pub mod store;
pub mod trigger;

pub use action::{
    Action, ActionCatalogEntry, ActionInvocation, ActionRegistry, ActionResult, ActionStatus,
    TriggerInfo,
};
pub use config::WebhookConfig;
pub use definition::{Workflow, WorkflowDefinition, WorkflowDraft, WorkflowMetadata, WorkflowStatus};
pub use edge::{EdgeSpec, WorkflowEdge};
pub use engine::{Catalog, Engine, EngineBuilder, ExecutionFault, ExecutionOutcome, PreparedTrigger};
pub use error::{ActionError, StoreError, TriggerError, WorkflowError};
pub use execution::{
    Context, ExecutionEventType, ExecutionHistory, ExecutionLogEntry, ExecutionReport,
    ExecutionStatus, WorkflowExecution, WorkflowExecutionEvent,
};
pub use graph::ValidationReport;
pub use node::{NodeConfig, NodeKind, NodeSpec, WorkflowNode};
pub use schema::PayloadSchema;
pub use service::WorkflowService;
pub use sink::{ExecutionSink, RecordingSink, RunMode, SimulationSink};
pub use store::{ExecutionRecorder, MemoryStore, WorkflowStore};
pub use trigger::{ContextResolver, TriggerCatalogEntry, TriggerDefinition, TriggerRegistry};
