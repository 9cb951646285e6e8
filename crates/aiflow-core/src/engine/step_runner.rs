//! Step runner for the five workflow step types.
//!
//! `StepRunner` dispatches execution to the appropriate handler based on
//! `StepType`. Every handler returns the step's result text; only AI
//! processing can actually fail at runtime, since the other types are pure
//! local operations.

use std::sync::Arc;

use aiflow_types::llm::LlmError;
use aiflow_types::workflow::{StepDefinition, StepType};

use super::condition;
use super::context::ExecutionContext;
use crate::llm::gateway::CompletionGateway;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors that can occur during step execution.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The AI gateway call failed (network, provider, parse, timeout).
    #[error("AI call failed: {0}")]
    AiCall(#[from] LlmError),

    /// The step carries a type tag the engine does not recognize.
    ///
    /// With definitions parsed into [`StepType`] this surfaces at
    /// deserialization boundaries rather than at dispatch.
    #[error("invalid step type: '{0}'")]
    InvalidStepType(String),

    /// Step execution failed for any other reason.
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),
}

// ---------------------------------------------------------------------------
// StepExecutor trait
// ---------------------------------------------------------------------------

/// Trait for step execution backends.
///
/// The run controller only needs "step in, result text out". The production
/// implementation is [`StepRunner`]; tests script their own to exercise
/// failure policies the real runner cannot produce on demand.
pub trait StepExecutor: Send + Sync {
    /// Execute a single step against the current context.
    fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> impl std::future::Future<Output = Result<String, StepError>> + Send;
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Executes individual workflow steps by dispatching on step type.
///
/// Generic over `G: CompletionGateway` so the AI handler works with any
/// provider backend.
pub struct StepRunner<G> {
    gateway: Arc<G>,
}

impl<G: CompletionGateway> StepRunner<G> {
    /// Create a new step runner backed by the given gateway.
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    async fn run_ai_processing(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> Result<String, StepError> {
        let prompt = match step.ai_prompt.as_deref() {
            Some(prompt) => prompt.to_string(),
            None => format!("Process the following business data: {}", ctx.describe()),
        };

        tracing::debug!(step = step.name.as_str(), "sending AI processing request");
        let result = self.gateway.complete(&prompt, ctx.values()).await?;
        Ok(result)
    }

    fn run_data_transformation(&self, step: &StepDefinition) -> String {
        match step.configuration.as_deref() {
            Some(config) if config.contains("transform") => {
                "Data transformed successfully".to_string()
            }
            _ => "Data transformation completed".to_string(),
        }
    }

    fn run_notification(&self, step: &StepDefinition) -> String {
        tracing::info!(step = step.name.as_str(), "dispatching notification");
        "Notification sent".to_string()
    }

    fn run_conditional(&self, step: &StepDefinition, ctx: &ExecutionContext) -> String {
        let prior = ctx.last_result().unwrap_or("");
        if condition::should_continue(step, prior) {
            "Condition met".to_string()
        } else {
            "Condition not met".to_string()
        }
    }

    fn run_manual_review(&self, step: &StepDefinition) -> String {
        tracing::info!(step = step.name.as_str(), "step parked for manual review");
        "Pending manual review".to_string()
    }
}

impl<G: CompletionGateway> StepExecutor for StepRunner<G> {
    async fn execute(
        &self,
        step: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> Result<String, StepError> {
        match step.step_type {
            StepType::AiProcessing => self.run_ai_processing(step, ctx).await,
            StepType::DataTransformation => Ok(self.run_data_transformation(step)),
            StepType::Notification => Ok(self.run_notification(step)),
            StepType::Conditional => Ok(self.run_conditional(step, ctx)),
            StepType::ManualReview => Ok(self.run_manual_review(step)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
