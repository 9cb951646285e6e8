//! Workflow domain types for Aiflow.
//!
//! Defines the canonical workflow definition (the JSON blob persisted per
//! workflow) and the execution tracking types (`ExecutionRecord`,
//! `StepRecord`). Step definitions are immutable; all run-scoped state lives
//! in per-execution records so concurrent runs of the same workflow never
//! interfere.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// A stored workflow: an ordered sequence of step definitions plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// UUIDv7 assigned on first save.
    pub id: Uuid,
    /// Human-readable workflow name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifecycle status of the definition itself (not of any run).
    #[serde(default)]
    pub status: WorkflowStatus,
    /// Step definitions. The engine sorts by `order` before running.
    pub steps: Vec<StepDefinition>,
    /// When the workflow was first saved.
    pub created_at: DateTime<Utc>,
    /// When the workflow was last modified.
    pub updated_at: DateTime<Utc>,
    /// When the workflow last finished a successful run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of a workflow definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// A single step in a workflow.
///
/// Immutable once saved: the engine never writes run state back onto the
/// definition. Per-run status and results live in [`StepRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// UUIDv7 step ID, unique within a workflow.
    pub id: Uuid,
    /// Human-readable step name.
    pub name: String,
    /// Position in the sequence. The engine runs steps in ascending order.
    pub order: i32,
    /// The kind of step.
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Prompt for AI processing steps. When absent, the engine synthesizes
    /// one from the execution context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
    /// Free-form configuration payload, usually a JSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

/// The kind of step in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    AiProcessing,
    DataTransformation,
    Notification,
    Conditional,
    ManualReview,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepType::AiProcessing => write!(f, "ai_processing"),
            StepType::DataTransformation => write!(f, "data_transformation"),
            StepType::Notification => write!(f, "notification"),
            StepType::Conditional => write!(f, "conditional"),
            StepType::ManualReview => write!(f, "manual_review"),
        }
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ai_processing" => Ok(StepType::AiProcessing),
            "data_transformation" => Ok(StepType::DataTransformation),
            "notification" => Ok(StepType::Notification),
            "conditional" => Ok(StepType::Conditional),
            "manual_review" => Ok(StepType::ManualReview),
            other => Err(format!("invalid step type: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution Status
// ---------------------------------------------------------------------------

/// Overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Status of an individual step within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

// ---------------------------------------------------------------------------
// Execution Record
// ---------------------------------------------------------------------------

/// A single execution instance of a workflow. Used for query results and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// UUIDv7 execution ID.
    pub id: Uuid,
    /// ID of the workflow definition being executed.
    pub workflow_id: Uuid,
    /// Current execution status.
    pub status: ExecutionStatus,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status (None while running).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Snapshot of the trigger input the run was seeded with.
    pub input_context: serde_json::Value,
    /// Snapshot of the full context when the run completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_context: Option<serde_json::Value>,
    /// Error message if the execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration, stamped at terminal transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// Per-run state of a single step.
///
/// One record per (execution, step) pair, updated in place as the step moves
/// through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// UUIDv7 record ID.
    pub id: Uuid,
    /// Parent execution ID.
    pub execution_id: Uuid,
    /// ID of the step definition this record tracks.
    pub step_id: Uuid,
    /// Step name (denormalized for display).
    pub step_name: String,
    /// Current step status.
    pub status: StepStatus,
    /// Result text produced by the step (or an error rendering on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// When step execution started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When step execution reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_workflow() -> WorkflowDefinition {
        let now = Utc::now();
        WorkflowDefinition {
            id: Uuid::now_v7(),
            name: "invoice-triage".to_string(),
            description: Some("Classify incoming invoices and notify finance".to_string()),
            status: WorkflowStatus::Active,
            steps: vec![
                StepDefinition {
                    id: Uuid::now_v7(),
                    name: "Classify Invoice".to_string(),
                    order: 1,
                    step_type: StepType::AiProcessing,
                    ai_prompt: Some("Classify this invoice by urgency".to_string()),
                    configuration: None,
                },
                StepDefinition {
                    id: Uuid::now_v7(),
                    name: "Check Result".to_string(),
                    order: 2,
                    step_type: StepType::Conditional,
                    ai_prompt: None,
                    configuration: Some(r#"{"condition":"success"}"#.to_string()),
                },
                StepDefinition {
                    id: Uuid::now_v7(),
                    name: "Normalize Fields".to_string(),
                    order: 3,
                    step_type: StepType::DataTransformation,
                    ai_prompt: None,
                    configuration: Some(r#"{"transform":"uppercase"}"#.to_string()),
                },
                StepDefinition {
                    id: Uuid::now_v7(),
                    name: "Notify Finance".to_string(),
                    order: 4,
                    step_type: StepType::Notification,
                    ai_prompt: None,
                    configuration: None,
                },
                StepDefinition {
                    id: Uuid::now_v7(),
                    name: "Final Review".to_string(),
                    order: 5,
                    step_type: StepType::ManualReview,
                    ai_prompt: None,
                    configuration: None,
                },
            ],
            created_at: now,
            updated_at: now,
            last_executed_at: None,
        }
    }

    // -----------------------------------------------------------------------
    // Definition roundtrip
    // -----------------------------------------------------------------------

    #[test]
    fn test_workflow_definition_json_roundtrip() {
        let original = sample_workflow();
        let json_str = serde_json::to_string_pretty(&original).expect("serialize to JSON");
        let parsed: WorkflowDefinition =
            serde_json::from_str(&json_str).expect("deserialize from JSON");
        assert_eq!(parsed.name, original.name);
        assert_eq!(parsed.status, WorkflowStatus::Active);
        assert_eq!(parsed.steps.len(), 5);
        assert_eq!(parsed.steps[0].step_type, StepType::AiProcessing);
        assert_eq!(parsed.steps[1].configuration.as_deref(), Some(r#"{"condition":"success"}"#));
    }

    #[test]
    fn test_workflow_definition_status_defaults_to_draft() {
        let json_str = format!(
            r#"{{
                "id": "{}",
                "name": "bare",
                "steps": [],
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:00:00Z"
            }}"#,
            Uuid::now_v7()
        );
        let parsed: WorkflowDefinition = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.status, WorkflowStatus::Draft);
        assert!(parsed.description.is_none());
        assert!(parsed.last_executed_at.is_none());
    }

    // -----------------------------------------------------------------------
    // StepType
    // -----------------------------------------------------------------------

    #[test]
    fn test_step_type_serde_tags() {
        let json = serde_json::to_string(&StepType::AiProcessing).unwrap();
        assert_eq!(json, "\"ai_processing\"");
        let json = serde_json::to_string(&StepType::ManualReview).unwrap();
        assert_eq!(json, "\"manual_review\"");
    }

    #[test]
    fn test_step_type_roundtrip() {
        for step_type in [
            StepType::AiProcessing,
            StepType::DataTransformation,
            StepType::Notification,
            StepType::Conditional,
            StepType::ManualReview,
        ] {
            let s = step_type.to_string();
            let parsed: StepType = s.parse().unwrap();
            assert_eq!(step_type, parsed);
        }
    }

    #[test]
    fn test_step_type_rejects_unknown_tag() {
        let err = "webhook".parse::<StepType>().unwrap_err();
        assert!(err.contains("invalid step type"));

        let result: Result<StepType, _> = serde_json::from_str("\"webhook\"");
        assert!(result.is_err());
    }

    // -----------------------------------------------------------------------
    // Status enums
    // -----------------------------------------------------------------------

    #[test]
    fn test_execution_status_serde() {
        for status in [
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: ExecutionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_execution_status_terminal() {
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_step_status_serde() {
        for status in [
            StepStatus::Pending,
            StepStatus::InProgress,
            StepStatus::Completed,
            StepStatus::Failed,
            StepStatus::Skipped,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: StepStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_step_status_in_progress_tag() {
        let json = serde_json::to_string(&StepStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    // -----------------------------------------------------------------------
    // ExecutionRecord and StepRecord roundtrip
    // -----------------------------------------------------------------------

    #[test]
    fn test_execution_record_json_roundtrip() {
        let record = ExecutionRecord {
            id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            status: ExecutionStatus::Completed,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            input_context: json!({"invoice_id": "INV-42"}),
            output_context: Some(json!({"invoice_id": "INV-42", "step_abc": "done"})),
            error: None,
            duration_ms: Some(1250),
        };
        let json_str = serde_json::to_string(&record).unwrap();
        let parsed: ExecutionRecord = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.status, ExecutionStatus::Completed);
        assert_eq!(parsed.duration_ms, Some(1250));
        assert_eq!(parsed.input_context["invoice_id"], "INV-42");
    }

    #[test]
    fn test_step_record_json_roundtrip() {
        let record = StepRecord {
            id: Uuid::now_v7(),
            execution_id: Uuid::now_v7(),
            step_id: Uuid::now_v7(),
            step_name: "Classify Invoice".to_string(),
            status: StepStatus::Completed,
            result: Some("urgent".to_string()),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
        };
        let json_str = serde_json::to_string(&record).unwrap();
        let parsed: StepRecord = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.step_name, "Classify Invoice");
        assert_eq!(parsed.status, StepStatus::Completed);
        assert_eq!(parsed.result.as_deref(), Some("urgent"));
    }
}
