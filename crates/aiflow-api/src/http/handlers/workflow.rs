//! Workflow CRUD and execution handlers for the REST API.
//!
//! Endpoints for managing workflow definitions, triggering executions, and
//! inspecting execution status with step-level records.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use aiflow_core::repository::WorkflowRepository;
use aiflow_types::workflow::{
    ExecutionStatus, StepDefinition, StepType, WorkflowDefinition, WorkflowStatus,
};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for creating or replacing a workflow definition.
///
/// IDs and timestamps are assigned server-side; clients describe only the
/// shape of the workflow.
#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub steps: Vec<StepRequest>,
}

/// A step within a [`WorkflowRequest`].
#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub name: String,
    pub order: i32,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub ai_prompt: Option<String>,
    #[serde(default)]
    pub configuration: Option<String>,
}

/// Query parameters for listing executions.
#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    /// Maximum number of executions to return (default 20).
    #[serde(default = "default_execution_limit")]
    pub limit: u32,
}

fn default_execution_limit() -> u32 {
    20
}

fn validate(req: &WorkflowRequest) -> Result<(), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    let mut orders = std::collections::HashSet::new();
    for step in &req.steps {
        if step.name.trim().is_empty() {
            return Err(AppError::Validation("step name must not be empty".to_string()));
        }
        if !orders.insert(step.order) {
            return Err(AppError::Validation(format!(
                "duplicate step order: {}",
                step.order
            )));
        }
    }
    Ok(())
}

fn build_steps(steps: Vec<StepRequest>) -> Vec<StepDefinition> {
    steps
        .into_iter()
        .map(|s| StepDefinition {
            id: Uuid::now_v7(),
            name: s.name,
            order: s.order,
            step_type: s.step_type,
            ai_prompt: s.ai_prompt,
            configuration: s.configuration,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the workflow sub-router.
///
/// Mounted at `/api/v1` by the main router. Provides CRUD for workflow
/// definitions, execution triggering, and execution inspection.
pub fn workflow_routes() -> Router<AppState> {
    Router::new()
        // Workflow CRUD
        .route("/workflows", post(create_workflow))
        .route("/workflows", get(list_workflows))
        .route("/workflows/{id}", get(get_workflow))
        .route("/workflows/{id}", put(update_workflow))
        .route("/workflows/{id}", delete(delete_workflow))
        // Executions
        .route("/workflows/{id}/execute", post(execute_workflow))
        .route("/workflows/{id}/executions", get(list_executions))
        .route("/executions/{execution_id}", get(get_execution))
        .route("/executions/{execution_id}/cancel", post(cancel_execution))
}

// ---------------------------------------------------------------------------
// Workflow CRUD handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows - Create a new workflow definition.
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(body): Json<WorkflowRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    validate(&body)?;

    let now = Utc::now();
    let def = WorkflowDefinition {
        id: Uuid::now_v7(),
        name: body.name,
        description: body.description,
        status: body.status.unwrap_or_default(),
        steps: build_steps(body.steps),
        created_at: now,
        updated_at: now,
        last_executed_at: None,
    };

    state.workflow_repo.save_definition(&def).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let wf_json = serde_json::to_value(&def)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(wf_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{}", def.id));

    Ok(Json(resp))
}

/// GET /api/v1/workflows - List all workflow definitions.
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let defs = state.workflow_repo.list_definitions().await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let mut defs_json = Vec::with_capacity(defs.len());
    for def in &defs {
        defs_json.push(serde_json::to_value(def).map_err(|e| AppError::Internal(e.to_string()))?);
    }

    let resp = ApiResponse::success(defs_json, request_id, elapsed)
        .with_link("self", "/api/v1/workflows");

    Ok(Json(resp))
}

/// GET /api/v1/workflows/:id - Get a workflow definition by ID.
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let def = state
        .workflow_repo
        .get_definition(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Workflow {id} not found")))?;

    let elapsed = start.elapsed().as_millis() as u64;
    let wf_json = serde_json::to_value(&def)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(wf_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{}", def.id))
        .with_link("executions", &format!("/api/v1/workflows/{}/executions", def.id));

    Ok(Json(resp))
}

/// PUT /api/v1/workflows/:id - Replace a workflow definition.
pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<WorkflowRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    validate(&body)?;

    let existing = state
        .workflow_repo
        .get_definition(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Workflow {id} not found")))?;

    let def = WorkflowDefinition {
        id,
        name: body.name,
        description: body.description,
        status: body.status.unwrap_or(existing.status),
        steps: build_steps(body.steps),
        created_at: existing.created_at,
        updated_at: Utc::now(),
        last_executed_at: existing.last_executed_at,
    };

    state.workflow_repo.save_definition(&def).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let wf_json = serde_json::to_value(&def)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(wf_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{}", def.id));

    Ok(Json(resp))
}

/// DELETE /api/v1/workflows/:id - Delete a workflow definition.
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let deleted = state.workflow_repo.delete_definition(&id).await?;

    if !deleted {
        return Err(AppError::NotFound(format!("Workflow {id} not found")));
    }

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::json!({"deleted": true, "id": id.to_string()}),
        request_id,
        elapsed,
    );

    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// Execution handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/:id/execute - Start a workflow execution.
///
/// Returns the `Running` execution record immediately; the run continues in
/// the background. The body is the trigger input (a JSON object or null).
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let input: HashMap<String, serde_json::Value> = match payload {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        serde_json::Value::Null => HashMap::new(),
        _ => {
            return Err(AppError::Validation(
                "trigger input must be a JSON object".to_string(),
            ));
        }
    };

    let record = state.engine.spawn_run(id, input).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let record_json = serde_json::to_value(&record)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(record_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/executions/{}", record.id))
        .with_link("workflow", &format!("/api/v1/workflows/{id}"));

    Ok(Json(resp))
}

/// GET /api/v1/workflows/:id/executions - List executions for a workflow.
pub async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let records = state.workflow_repo.list_executions(&id, query.limit).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let mut records_json = Vec::with_capacity(records.len());
    for record in &records {
        records_json
            .push(serde_json::to_value(record).map_err(|e| AppError::Internal(e.to_string()))?);
    }

    let resp = ApiResponse::success(records_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{id}/executions"))
        .with_link("workflow", &format!("/api/v1/workflows/{id}"));

    Ok(Json(resp))
}

/// GET /api/v1/executions/:execution_id - Get execution detail with step records.
pub async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let record = state
        .workflow_repo
        .get_execution(&execution_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Execution {execution_id} not found")))?;

    let steps = state.workflow_repo.list_step_records(&execution_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;

    let mut record_json = serde_json::to_value(&record)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    record_json["steps"] =
        serde_json::to_value(&steps).map_err(|e| AppError::Internal(e.to_string()))?;

    let resp = ApiResponse::success(record_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/executions/{execution_id}"))
        .with_link(
            "workflow",
            &format!("/api/v1/workflows/{}", record.workflow_id),
        );

    Ok(Json(resp))
}

/// POST /api/v1/executions/:execution_id/cancel - Cancel a running execution.
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let mut record = state
        .workflow_repo
        .get_execution(&execution_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Execution {execution_id} not found")))?;

    if record.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "Execution cannot be cancelled (current status: {:?})",
            record.status
        )));
    }

    let now = Utc::now();
    record.status = ExecutionStatus::Cancelled;
    record.completed_at = Some(now);
    record.duration_ms = Some((now - record.started_at).num_milliseconds());
    record.error = Some("Cancelled by user".to_string());

    state.workflow_repo.update_execution(&record).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::json!({"execution_id": execution_id.to_string(), "status": "cancelled"}),
        request_id,
        elapsed,
    )
    .with_link("self", &format!("/api/v1/executions/{execution_id}"));

    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_request_steps_use_type_tag() {
        let body = r#"{
            "name": "invoice-triage",
            "steps": [
                {"name": "Classify", "order": 1, "type": "ai_processing", "ai_prompt": "Classify"},
                {"name": "Gate", "order": 2, "type": "conditional", "configuration": "{\"condition\":\"success\"}"}
            ]
        }"#;
        let req: WorkflowRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.name, "invoice-triage");
        assert_eq!(req.steps.len(), 2);
        assert_eq!(req.steps[0].step_type, StepType::AiProcessing);
        assert_eq!(req.steps[1].step_type, StepType::Conditional);
        assert!(req.status.is_none());
    }

    #[test]
    fn workflow_request_rejects_unknown_step_type() {
        let body = r#"{"name": "x", "steps": [{"name": "s", "order": 1, "type": "teleport"}]}"#;
        assert!(serde_json::from_str::<WorkflowRequest>(body).is_err());
    }

    #[test]
    fn validate_rejects_blank_names() {
        let req = WorkflowRequest {
            name: "  ".to_string(),
            description: None,
            status: None,
            steps: Vec::new(),
        };
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_rejects_duplicate_step_orders() {
        let req = WorkflowRequest {
            name: "invoice-triage".to_string(),
            description: None,
            status: None,
            steps: vec![
                StepRequest {
                    name: "Classify".to_string(),
                    order: 1,
                    step_type: StepType::AiProcessing,
                    ai_prompt: None,
                    configuration: None,
                },
                StepRequest {
                    name: "Notify".to_string(),
                    order: 1,
                    step_type: StepType::Notification,
                    ai_prompt: None,
                    configuration: None,
                },
            ],
        };
        let err = validate(&req).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("duplicate step order")));
    }

    #[test]
    fn build_steps_assigns_unique_ids() {
        let steps = build_steps(vec![
            StepRequest {
                name: "a".to_string(),
                order: 1,
                step_type: StepType::Notification,
                ai_prompt: None,
                configuration: None,
            },
            StepRequest {
                name: "b".to_string(),
                order: 2,
                step_type: StepType::ManualReview,
                ai_prompt: None,
                configuration: None,
            },
        ]);
        assert_ne!(steps[0].id, steps[1].id);
        assert_eq!(steps[0].order, 1);
    }

    #[test]
    fn list_executions_query_defaults_to_20() {
        let query: ListExecutionsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);
    }
}
