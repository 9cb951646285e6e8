//! Direct AI endpoints: prompt processing, data analysis, decision support.
//!
//! These bypass the workflow engine and hit the completion gateway directly.
//! Payloads mirror the gateway helpers: `/analyze` merges `success` into the
//! structured analysis object, the other two wrap their result field.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use aiflow_core::llm::{CompletionGateway, assist};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for `POST /ai/process`.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

/// Body for `POST /ai/analyze`.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub data: String,
    #[serde(rename = "analysisType", default = "default_analysis_type")]
    pub analysis_type: String,
}

fn default_analysis_type() -> String {
    "general".to_string()
}

/// Body for `POST /ai/decision`.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub scenario: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the AI sub-router, mounted at `/api/v1` by the main router.
pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/process", post(process))
        .route("/ai/analyze", post(analyze))
        .route("/ai/decision", post(decision))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/ai/process - Run a free-form prompt through the gateway.
pub async fn process(
    State(state): State<AppState>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let result = state.gateway.complete(&body.prompt, &body.context).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        json!({"result": result, "success": true}),
        request_id,
        elapsed,
    );

    Ok(Json(resp))
}

/// POST /api/v1/ai/analyze - Structured analysis of business data.
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let mut analysis =
        assist::analyze_data(state.gateway.as_ref(), &body.data, &body.analysis_type).await?;
    analysis["success"] = json!(true);

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(analysis, request_id, elapsed);

    Ok(Json(resp))
}

/// POST /api/v1/ai/decision - Decision support for a business scenario.
pub async fn decision(
    State(state): State<AppState>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let decision =
        assist::generate_decision(state.gateway.as_ref(), &body.scenario, &body.parameters).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        json!({"decision": decision, "success": true}),
        request_id,
        elapsed,
    );

    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_request_context_defaults_to_empty() {
        let req: ProcessRequest =
            serde_json::from_str(r#"{"prompt": "Classify this invoice"}"#).unwrap();
        assert_eq!(req.prompt, "Classify this invoice");
        assert!(req.context.is_empty());
    }

    #[test]
    fn analyze_request_uses_camel_case_type_field() {
        let req: AnalyzeRequest =
            serde_json::from_str(r#"{"data": "Q3 revenue", "analysisType": "financial"}"#).unwrap();
        assert_eq!(req.analysis_type, "financial");

        let req: AnalyzeRequest = serde_json::from_str(r#"{"data": "Q3 revenue"}"#).unwrap();
        assert_eq!(req.analysis_type, "general");
    }

    #[test]
    fn decision_request_parameters_default_to_empty() {
        let req: DecisionRequest =
            serde_json::from_str(r#"{"scenario": "Expand to new market"}"#).unwrap();
        assert!(req.parameters.is_empty());
    }
}
