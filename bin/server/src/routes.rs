//! HTTP routes for the workflow API.
//!
//! Every handler is generic over the store so the same router serves
//! PostgreSQL in production and the in-memory store in tests.

use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::str::FromStr;
use std::sync::Arc;
use washline_core::{ExecutionId, WorkflowId};
use washline_workflow::{
    Catalog, ExecutionHistory, ExecutionReport, ValidationReport, Workflow, WorkflowDefinition,
    WorkflowDraft, WorkflowExecution, WorkflowService, WorkflowStore,
};

type AppState<S> = Arc<WorkflowService<S>>;

/// Builds the API router over a workflow service.
pub fn router<S>(service: WorkflowService<S>) -> Router
where
    S: WorkflowStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/catalog", get(catalog::<S>))
        .route(
            "/api/workflows",
            get(list_workflows::<S>).post(create_workflow::<S>),
        )
        .route(
            "/api/workflows/{id}",
            get(get_workflow::<S>)
                .put(update_workflow::<S>)
                .delete(delete_workflow::<S>),
        )
        .route("/api/workflows/{id}/validate", get(validate_workflow::<S>))
        .route("/api/workflows/{id}/simulate", post(simulate_workflow::<S>))
        .route("/api/workflows/{id}/executions", get(list_executions::<S>))
        .route("/api/executions/{id}", get(get_execution::<S>))
        .route("/api/triggers/{trigger_type}", post(fire_trigger::<S>))
        .with_state(Arc::new(service))
}

fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    T::from_str(raw).map_err(|e| ApiError::InvalidId {
        id: raw.to_string(),
        reason: e.to_string(),
    })
}

fn workflow_not_found(id: WorkflowId) -> ApiError {
    ApiError::NotFound {
        resource: "workflow",
        id: id.to_string(),
    }
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

async fn catalog<S: WorkflowStore>(State(service): State<AppState<S>>) -> Json<Catalog> {
    Json(service.catalog())
}

async fn list_workflows<S: WorkflowStore>(
    State(service): State<AppState<S>>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    Ok(Json(service.list_workflows().await?))
}

async fn create_workflow<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Json(draft): Json<WorkflowDraft>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let workflow = service.create_workflow(draft).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn get_workflow<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let id: WorkflowId = parse_id(&id)?;
    service
        .get_workflow(id)
        .await?
        .map(Json)
        .ok_or_else(|| workflow_not_found(id))
}

async fn update_workflow<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
    Json(draft): Json<WorkflowDraft>,
) -> Result<Json<Workflow>, ApiError> {
    let id: WorkflowId = parse_id(&id)?;
    service
        .update_workflow(id, draft)
        .await?
        .map(Json)
        .ok_or_else(|| workflow_not_found(id))
}

async fn delete_workflow<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    let id: WorkflowId = parse_id(&id)?;
    service
        .delete_workflow(id)
        .await?
        .map(Json)
        .ok_or_else(|| workflow_not_found(id))
}

async fn validate_workflow<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<ValidationReport>, ApiError> {
    let id: WorkflowId = parse_id(&id)?;
    service
        .validate_workflow(id)
        .await?
        .map(Json)
        .ok_or_else(|| workflow_not_found(id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateRequest {
    trigger_type: String,
    #[serde(default)]
    payload: JsonValue,
}

async fn simulate_workflow<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<ExecutionReport>, ApiError> {
    let id: WorkflowId = parse_id(&id)?;
    service
        .simulate_workflow(id, &request.trigger_type, &request.payload)
        .await?
        .map(Json)
        .ok_or_else(|| workflow_not_found(id))
}

async fn list_executions<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkflowExecution>>, ApiError> {
    let id: WorkflowId = parse_id(&id)?;
    Ok(Json(service.list_executions(id).await?))
}

async fn get_execution<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionHistory>, ApiError> {
    let id: ExecutionId = parse_id(&id)?;
    service
        .get_execution(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            resource: "execution",
            id: id.to_string(),
        })
}

async fn fire_trigger<S: WorkflowStore>(
    State(service): State<AppState<S>>,
    Path(trigger_type): Path<String>,
    Json(payload): Json<JsonValue>,
) -> Result<Json<Vec<ExecutionReport>>, ApiError> {
    Ok(Json(service.run_trigger(&trigger_type, &payload).await?))
}
