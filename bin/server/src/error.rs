//! Error responses for the HTTP API.
//!
//! Handlers return [`ApiError`]; its [`IntoResponse`] impl picks the status
//! code and writes a user-safe JSON body. Storage details are logged, never
//! returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rootcause::prelude::Report;
use serde::Serialize;
use std::fmt;
use tracing::error;
use washline_workflow::{TriggerError, WorkflowError};

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The addressed resource does not exist.
    NotFound { resource: &'static str, id: String },
    /// A path identifier could not be parsed.
    InvalidId { id: String, reason: String },
    /// The workflow service rejected or failed the operation.
    Workflow(Report<WorkflowError>),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { resource, id } => write!(f, "{resource} '{id}' not found"),
            Self::InvalidId { id, reason } => write!(f, "invalid id '{id}': {reason}"),
            Self::Workflow(report) => write!(f, "{}", report.current_context()),
        }
    }
}

impl From<Report<WorkflowError>> for ApiError {
    fn from(report: Report<WorkflowError>) -> Self {
        Self::Workflow(report)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            errors: Vec::new(),
        }
    }
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorBody::new(self.to_string())),
            Self::InvalidId { .. } => (StatusCode::BAD_REQUEST, ErrorBody::new(self.to_string())),
            Self::Workflow(report) => match report.current_context() {
                WorkflowError::InvalidGraph { errors } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody {
                        error: "Workflow graph is invalid".to_string(),
                        errors: errors.clone(),
                    },
                ),
                WorkflowError::InvalidStateTransition { .. } => {
                    (StatusCode::CONFLICT, ErrorBody::new(self.to_string()))
                }
                WorkflowError::Trigger(TriggerError::InvalidPayload { problems, .. }) => (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        error: self.to_string(),
                        errors: problems.clone(),
                    },
                ),
                WorkflowError::Trigger(_) => {
                    (StatusCode::BAD_REQUEST, ErrorBody::new(self.to_string()))
                }
                WorkflowError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Storage error"),
                ),
                WorkflowError::ExecutionFault { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(self.to_string()),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use washline_core::WorkflowId;
    use washline_workflow::StoreError;

    fn api_error(err: WorkflowError) -> ApiError {
        let report: Report<WorkflowError> = err.into();
        ApiError::from(report)
    }

    fn status(err: WorkflowError) -> StatusCode {
        api_error(err).status_and_body().0
    }

    #[test]
    fn workflow_errors_map_to_statuses() {
        assert_eq!(
            status(WorkflowError::InvalidGraph { errors: vec![] }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(WorkflowError::InvalidStateTransition {
                from: "archived".to_string(),
                to: "active".to_string(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(WorkflowError::Trigger(TriggerError::Unknown {
                trigger_type: "orders.refunded".to_string(),
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(WorkflowError::ExecutionFault {
                workflow_id: WorkflowId::new(),
                execution_id: None,
                reason: "boom".to_string(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = api_error(WorkflowError::Store(StoreError::Database {
            details: "connection refused on 10.0.0.4".to_string(),
        }));
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Storage error");
    }

    #[test]
    fn invalid_graph_lists_validator_errors() {
        let err = api_error(WorkflowError::InvalidGraph {
            errors: vec!["Workflow must have at least one trigger node".to_string()],
        });
        let (_, body) = err.status_and_body();
        assert_eq!(body.errors, vec!["Workflow must have at least one trigger node"]);
    }

    #[test]
    fn not_found_names_the_resource() {
        let err = ApiError::NotFound {
            resource: "workflow",
            id: "wf_01".to_string(),
        };
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "workflow 'wf_01' not found");
    }
}
