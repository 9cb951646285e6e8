//! Prompt helpers layered on [`CompletionGateway`].
//!
//! Builds the analysis and decision prompts used by the `/ai` API endpoints
//! and normalizes the responses into structured JSON.

use std::collections::HashMap;

use aiflow_types::llm::LlmError;
use serde_json::{Value, json};

use super::gateway::CompletionGateway;

/// Ask the gateway for a structured analysis of free-form business data.
///
/// The model is prompted for a JSON object with `summary`, `keyFindings`,
/// `recommendations`, and `riskLevel`. When the response is not valid JSON,
/// the raw text is returned under `rawResponse` instead of failing.
pub async fn analyze_data<G: CompletionGateway>(
    gateway: &G,
    data: &str,
    analysis_type: &str,
) -> Result<Value, LlmError> {
    let prompt = format!(
        "Analyze the following {analysis_type} data and provide structured insights:\n\n\
         {data}\n\n\
         Provide a JSON response with: summary, keyFindings, recommendations, and riskLevel"
    );

    let context = HashMap::from([("analysisType".to_string(), json!(analysis_type))]);
    let response = gateway.complete(&prompt, &context).await?;

    match serde_json::from_str::<Value>(&response) {
        Ok(parsed) => Ok(json!({
            "summary": parsed.get("summary").and_then(Value::as_str).unwrap_or("Analysis completed"),
            "keyFindings": parsed.get("keyFindings").cloned().unwrap_or(Value::Null),
            "recommendations": parsed.get("recommendations").cloned().unwrap_or(Value::Null),
            "riskLevel": parsed.get("riskLevel").and_then(Value::as_str).unwrap_or("MEDIUM"),
        })),
        Err(_) => {
            tracing::warn!("AI response was not valid JSON, returning raw response");
            Ok(json!({ "rawResponse": response }))
        }
    }
}

/// Ask the gateway for a decision on a business scenario.
pub async fn generate_decision<G: CompletionGateway>(
    gateway: &G,
    scenario: &str,
    parameters: &HashMap<String, Value>,
) -> Result<String, LlmError> {
    let params = serde_json::to_string(parameters).unwrap_or_default();
    let prompt = format!(
        "Given the following business scenario and parameters, provide a decision:\n\n\
         Scenario: {scenario}\nParameters: {params}\n\n\
         Provide a clear decision with reasoning."
    );

    gateway.complete(&prompt, parameters).await
}
