//! Conditional step gating.
//!
//! Decides whether a run continues past a conditional step. The evaluator is
//! deliberately fail-open: a missing, malformed, or unrecognized condition
//! configuration lets the run proceed, so a bad config can never strand a
//! workflow.

use aiflow_types::workflow::StepDefinition;
use serde_json::Value;

/// Evaluate a conditional step against the most recent prior step result.
///
/// Rules:
/// - No configuration, or configuration that is not a JSON object with a
///   `condition` field: continue (`true`), logged at warn level when the
///   payload fails to parse.
/// - `condition == "success"`: continue only when the prior result is
///   non-empty and does not contain the substring `"Error"`.
/// - Any other condition value: continue (`true`).
pub fn should_continue(step: &StepDefinition, prior_result: &str) -> bool {
    let Some(config) = step.configuration.as_deref() else {
        return true;
    };

    let parsed: Value = match serde_json::from_str(config) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(
                step = step.name.as_str(),
                error = %err,
                "unparseable condition configuration, continuing"
            );
            return true;
        }
    };

    match parsed.get("condition").and_then(Value::as_str) {
        Some("success") => !prior_result.is_empty() && !prior_result.contains("Error"),
        Some(other) => {
            tracing::debug!(
                step = step.name.as_str(),
                condition = other,
                "unrecognized condition, continuing"
            );
            true
        }
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
