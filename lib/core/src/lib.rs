//! Core domain types shared by the washline crates.
//!
//! This crate provides the strongly-typed identifiers used throughout the
//! workflow engine and the `Result` alias every layer builds its errors on.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{EdgeId, ExecutionEventId, ExecutionId, NodeId, ParseIdError, WorkflowId};
