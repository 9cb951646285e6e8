//! Workflow execution context.
//!
//! `ExecutionContext` is the mutable state that flows through a run. It is
//! seeded from the trigger input and accumulates one entry per completed
//! step under a `step_{id}` key. Step IDs are unique within a workflow, so
//! entries are never overwritten.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Value, json};
use uuid::Uuid;

/// Mutable execution context that tracks state across a workflow run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Trigger input plus accumulated step results.
    values: HashMap<String, Value>,
    /// Result text of the most recently completed step.
    last_result: Option<String>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded with the trigger input.
    pub fn seeded(input: HashMap<String, Value>) -> Self {
        Self {
            values: input,
            last_result: None,
        }
    }

    /// Record a completed step's result under its `step_{id}` key.
    pub fn insert_step_result(&mut self, step_id: Uuid, result: String) {
        self.values
            .insert(format!("step_{step_id}"), json!(result.clone()));
        self.last_result = Some(result);
    }

    /// Get a context value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All context values.
    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Result of the most recently completed step, if any.
    pub fn last_result(&self) -> Option<&str> {
        self.last_result.as_deref()
    }

    /// Number of entries in the context.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context holds no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render a compact textual summary for prompt synthesis.
    ///
    /// Keys are sorted so the rendering is deterministic.
    pub fn describe(&self) -> String {
        let ordered: BTreeMap<&String, &Value> = self.values.iter().collect();
        serde_json::to_string(&ordered).unwrap_or_default()
    }

    /// Serialize the context to a JSON object for snapshotting.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Restore a context from a JSON snapshot.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let values: HashMap<String, Value> = serde_json::from_value(value)?;
        Ok(Self {
            values,
            last_result: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_context() -> ExecutionContext {
        ExecutionContext::seeded(HashMap::from([
            ("invoice_id".to_string(), json!("INV-42")),
            ("amount".to_string(), json!(1250.0)),
        ]))
    }

    #[test]
    fn test_seeded_context_holds_input() {
        let ctx = seeded_context();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get("invoice_id"), Some(&json!("INV-42")));
        assert!(ctx.last_result().is_none());
    }

    #[test]
    fn test_insert_step_result_uses_step_key() {
        let mut ctx = seeded_context();
        let step_id = Uuid::now_v7();
        ctx.insert_step_result(step_id, "classified as urgent".to_string());

        assert_eq!(ctx.len(), 3);
        assert_eq!(
            ctx.get(&format!("step_{step_id}")),
            Some(&json!("classified as urgent"))
        );
        assert_eq!(ctx.last_result(), Some("classified as urgent"));
    }

    #[test]
    fn test_last_result_tracks_most_recent_step() {
        let mut ctx = ExecutionContext::new();
        ctx.insert_step_result(Uuid::now_v7(), "first".to_string());
        ctx.insert_step_result(Uuid::now_v7(), "second".to_string());
        assert_eq!(ctx.last_result(), Some("second"));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_describe_is_deterministic_and_compact() {
        let ctx = seeded_context();
        let rendered = ctx.describe();
        assert_eq!(rendered, ctx.describe());
        assert!(rendered.contains("\"invoice_id\":\"INV-42\""));
        assert!(rendered.contains("amount"));
    }

    #[test]
    fn test_json_snapshot_roundtrip() {
        let mut ctx = seeded_context();
        ctx.insert_step_result(Uuid::now_v7(), "done".to_string());

        let snapshot = ctx.to_json();
        let restored = ExecutionContext::from_json(snapshot).unwrap();

        assert_eq!(restored.len(), ctx.len());
        assert_eq!(restored.get("invoice_id"), Some(&json!("INV-42")));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(ExecutionContext::from_json(json!("not a map")).is_err());
        assert!(ExecutionContext::from_json(json!([1, 2, 3])).is_err());
    }
}
