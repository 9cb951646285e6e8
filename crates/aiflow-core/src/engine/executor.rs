//! Workflow run controller: sequential execution with per-step checkpointing.
//!
//! The `WorkflowEngine` drives a run from trigger to terminal status:
//!
//! 1. Load the definition; unknown IDs are the only error the caller sees.
//! 2. Create and persist the `Running` execution record.
//! 3. Execute steps in ascending `order`, checkpointing every step record
//!    transition through the repository.
//! 4. Step failures become run state, never caller errors: a failing
//!    ManualReview step is tolerated, any other failing step halts the run
//!    as `Failed`. A Conditional step whose condition is not met stops the
//!    run early as `Completed`.
//! 5. The execution record is mutated exactly once at the end of the run
//!    with terminal status, context snapshot, and duration.

use std::collections::HashMap;
use std::sync::Arc;

use aiflow_types::error::RepositoryError;
use aiflow_types::workflow::{
    ExecutionRecord, ExecutionStatus, StepDefinition, StepRecord, StepStatus, StepType,
    WorkflowDefinition,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::repository::WorkflowRepository;

use super::condition;
use super::context::ExecutionContext;
use super::step_runner::StepExecutor;

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Sequential workflow engine.
///
/// Generic over `R: WorkflowRepository` for storage and `S: StepExecutor`
/// for step execution, so both can be swapped for in-memory test doubles.
pub struct WorkflowEngine<R, S> {
    repo: Arc<R>,
    runner: Arc<S>,
}

impl<R, S> Clone for WorkflowEngine<R, S> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            runner: Arc::clone(&self.runner),
        }
    }
}

/// How the step loop ended.
enum LoopOutcome {
    /// All steps ran (or a conditional stopped the run early).
    Finished,
    /// A non-ManualReview step failed; the run halts as `Failed`.
    Halted { step_name: String, error: String },
}

impl<R, S> WorkflowEngine<R, S>
where
    R: WorkflowRepository + 'static,
    S: StepExecutor + 'static,
{
    /// Create a new engine backed by the given repository and step executor.
    pub fn new(repo: Arc<R>, runner: Arc<S>) -> Self {
        Self { repo, runner }
    }

    /// Execute a workflow to completion and return the terminal record.
    ///
    /// Only `WorkflowNotFound` (and repository failures before the run
    /// record exists) surface as errors; everything that happens after the
    /// `Running` record is persisted becomes run state.
    pub async fn run_workflow(
        &self,
        workflow_id: Uuid,
        input: HashMap<String, Value>,
    ) -> Result<ExecutionRecord, EngineError> {
        let definition = self.load_definition(workflow_id).await?;
        let record = self.begin(&definition, &input).await?;
        Ok(self.drive(definition, record, input).await)
    }

    /// Start a workflow run and return the `Running` handle immediately.
    ///
    /// The rest of the run continues on a spawned task; callers observe
    /// progress by polling the execution record.
    pub async fn spawn_run(
        &self,
        workflow_id: Uuid,
        input: HashMap<String, Value>,
    ) -> Result<ExecutionRecord, EngineError> {
        let definition = self.load_definition(workflow_id).await?;
        let record = self.begin(&definition, &input).await?;

        let engine = self.clone();
        let handle = record.clone();
        tokio::spawn(async move {
            engine.drive(definition, record, input).await;
        });

        Ok(handle)
    }

    async fn load_definition(
        &self,
        workflow_id: Uuid,
    ) -> Result<WorkflowDefinition, EngineError> {
        self.repo
            .get_definition(&workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))
    }

    /// Create and persist the `Running` execution record.
    async fn begin(
        &self,
        definition: &WorkflowDefinition,
        input: &HashMap<String, Value>,
    ) -> Result<ExecutionRecord, EngineError> {
        let input_context = Value::Object(
            input
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        let record = ExecutionRecord {
            id: Uuid::now_v7(),
            workflow_id: definition.id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            input_context,
            output_context: None,
            error: None,
            duration_ms: None,
        };

        self.repo.create_execution(&record).await?;

        tracing::info!(
            execution_id = %record.id,
            workflow = definition.name.as_str(),
            steps = definition.steps.len(),
            "starting workflow execution"
        );

        Ok(record)
    }

    /// Run the step loop and stamp the terminal state. Infallible: every
    /// error past this point is folded into the execution record.
    async fn drive(
        &self,
        definition: WorkflowDefinition,
        mut record: ExecutionRecord,
        input: HashMap<String, Value>,
    ) -> ExecutionRecord {
        let mut ctx = ExecutionContext::seeded(input);
        let outcome = self.execute_steps(&definition, record.id, &mut ctx).await;

        let completed_at = Utc::now();
        record.completed_at = Some(completed_at);
        record.duration_ms = Some((completed_at - record.started_at).num_milliseconds());
        record.output_context = Some(ctx.to_json());

        match outcome {
            Ok(LoopOutcome::Finished) => {
                record.status = ExecutionStatus::Completed;
                if let Err(err) = self
                    .repo
                    .touch_last_executed(&record.workflow_id, completed_at)
                    .await
                {
                    tracing::warn!(
                        workflow_id = %record.workflow_id,
                        error = %err,
                        "failed to stamp last_executed_at"
                    );
                }
            }
            Ok(LoopOutcome::Halted { step_name, error }) => {
                record.status = ExecutionStatus::Failed;
                record.error = Some(format!("Step failed: {step_name} - {error}"));
            }
            Err(err) => {
                tracing::error!(
                    execution_id = %record.id,
                    error = %err,
                    "workflow run aborted by internal error"
                );
                record.status = ExecutionStatus::Failed;
                record.error = Some(err.to_string());
            }
        }

        if let Err(err) = self.repo.update_execution(&record).await {
            tracing::error!(
                execution_id = %record.id,
                error = %err,
                "failed to persist terminal execution state"
            );
        }

        tracing::info!(
            execution_id = %record.id,
            status = ?record.status,
            duration_ms = record.duration_ms,
            "workflow execution finished"
        );

        record
    }

    /// Execute steps in ascending `order`, checkpointing each transition.
    async fn execute_steps(
        &self,
        definition: &WorkflowDefinition,
        execution_id: Uuid,
        ctx: &mut ExecutionContext,
    ) -> Result<LoopOutcome, EngineError> {
        let mut steps: Vec<&StepDefinition> = definition.steps.iter().collect();
        steps.sort_by_key(|s| s.order);

        for step in steps {
            let mut record = StepRecord {
                id: Uuid::now_v7(),
                execution_id,
                step_id: step.id,
                step_name: step.name.clone(),
                status: StepStatus::InProgress,
                result: None,
                started_at: Some(Utc::now()),
                completed_at: None,
            };
            self.repo.save_step_record(&record).await?;

            tracing::info!(
                step = step.name.as_str(),
                order = step.order,
                step_type = %step.step_type,
                "executing step"
            );

            // The result of the most recent prior step, captured before this
            // step's own result lands in the context.
            let prior = ctx.last_result().map(str::to_string);

            match self.runner.execute(step, ctx).await {
                Ok(result) => {
                    record.status = StepStatus::Completed;
                    record.result = Some(result.clone());
                    record.completed_at = Some(Utc::now());
                    self.repo.save_step_record(&record).await?;

                    ctx.insert_step_result(step.id, result);

                    if step.step_type == StepType::Conditional
                        && !condition::should_continue(step, prior.as_deref().unwrap_or(""))
                    {
                        record.status = StepStatus::Skipped;
                        self.repo.save_step_record(&record).await?;
                        tracing::info!(
                            step = step.name.as_str(),
                            "condition not met, stopping workflow"
                        );
                        return Ok(LoopOutcome::Finished);
                    }
                }
                Err(err) => {
                    record.status = StepStatus::Failed;
                    record.result = Some(format!("Error: {err}"));
                    record.completed_at = Some(Utc::now());
                    self.repo.save_step_record(&record).await?;

                    if step.step_type == StepType::ManualReview {
                        tracing::warn!(
                            step = step.name.as_str(),
                            error = %err,
                            "manual review step failed, continuing"
                        );
                    } else {
                        return Ok(LoopOutcome::Halted {
                            step_name: step.name.clone(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        Ok(LoopOutcome::Finished)
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors that can occur before a run's record exists.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No workflow definition with the given ID.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
