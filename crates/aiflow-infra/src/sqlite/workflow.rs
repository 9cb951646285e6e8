//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `aiflow-core` using sqlx with split
//! read/write pools. Workflow definitions are stored as JSON blobs with the
//! hot columns (name, status, last_executed_at) denormalized for querying.
//! Executions and step records track run state for auditing and crash
//! recovery.

use aiflow_core::repository::WorkflowRepository;
use aiflow_types::error::RepositoryError;
use aiflow_types::workflow::{
    ExecutionRecord, ExecutionStatus, StepRecord, StepStatus, WorkflowDefinition,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct WorkflowDefRow {
    definition: String,
    last_executed_at: Option<String>,
}

impl WorkflowDefRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            definition: row.try_get("definition")?,
            last_executed_at: row.try_get("last_executed_at")?,
        })
    }

    /// The `last_executed_at` column is authoritative: it is stamped after
    /// completed runs without rewriting the definition blob.
    fn into_definition(self) -> Result<WorkflowDefinition, RepositoryError> {
        let mut def: WorkflowDefinition = serde_json::from_str(&self.definition)
            .map_err(|e| RepositoryError::Query(format!("invalid workflow definition JSON: {e}")))?;

        def.last_executed_at = self
            .last_executed_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(def)
    }
}

struct ExecutionRow {
    id: String,
    workflow_id: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    input_context: String,
    output_context: Option<String>,
    error: Option<String>,
    duration_ms: Option<i64>,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            status: row.try_get("status")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            input_context: row.try_get("input_context")?,
            output_context: row.try_get("output_context")?,
            error: row.try_get("error")?,
            duration_ms: row.try_get("duration_ms")?,
        })
    }

    fn into_record(self) -> Result<ExecutionRecord, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let workflow_id = parse_uuid(&self.workflow_id)?;
        let status: ExecutionStatus =
            serde_json::from_value(serde_json::Value::String(self.status.clone()))
                .map_err(|_| {
                    RepositoryError::Query(format!("invalid execution status: {}", self.status))
                })?;

        let input_context: serde_json::Value = serde_json::from_str(&self.input_context)
            .map_err(|e| RepositoryError::Query(format!("invalid input_context JSON: {e}")))?;

        let output_context = self
            .output_context
            .as_deref()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| RepositoryError::Query(format!("invalid output_context: {e}")))
            })
            .transpose()?;

        let started_at = parse_datetime(&self.started_at)?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(ExecutionRecord {
            id,
            workflow_id,
            status,
            started_at,
            completed_at,
            input_context,
            output_context,
            error: self.error,
            duration_ms: self.duration_ms,
        })
    }
}

struct StepRow {
    id: String,
    execution_id: String,
    step_id: String,
    step_name: String,
    status: String,
    result: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl StepRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            execution_id: row.try_get("execution_id")?,
            step_id: row.try_get("step_id")?,
            step_name: row.try_get("step_name")?,
            status: row.try_get("status")?,
            result: row.try_get("result")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_record(self) -> Result<StepRecord, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let execution_id = parse_uuid(&self.execution_id)?;
        let step_id = parse_uuid(&self.step_id)?;
        let status: StepStatus =
            serde_json::from_value(serde_json::Value::String(self.status.clone()))
                .map_err(|_| {
                    RepositoryError::Query(format!("invalid step status: {}", self.status))
                })?;

        let started_at = self
            .started_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(StepRecord {
            id,
            execution_id,
            step_id,
            step_name: self.step_name,
            status,
            result: self.result,
            started_at,
            completed_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Snake_case status string as stored in the database.
fn status_str<S: serde::Serialize>(status: &S) -> Result<String, RepositoryError> {
    let value = serde_json::to_value(status).map_err(|e| RepositoryError::Query(e.to_string()))?;
    match value.as_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(RepositoryError::Query("status is not a string".to_string())),
    }
}

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn save_definition(&self, def: &WorkflowDefinition) -> Result<(), RepositoryError> {
        let definition_json = serde_json::to_string(def)
            .map_err(|e| RepositoryError::Query(format!("serialize definition: {e}")))?;

        let def_status = status_str(&def.status)?;

        sqlx::query(
            r#"INSERT INTO workflows (id, name, status, definition, created_at, updated_at, last_executed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 status = excluded.status,
                 definition = excluded.definition,
                 updated_at = excluded.updated_at"#,
        )
        .bind(def.id.to_string())
        .bind(&def.name)
        .bind(&def_status)
        .bind(&definition_json)
        .bind(format_datetime(&def.created_at))
        .bind(format_datetime(&def.updated_at))
        .bind(def.last_executed_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_definition(
        &self,
        id: &Uuid,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        let row = sqlx::query("SELECT definition, last_executed_at FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = WorkflowDefRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_definition()?))
            }
            None => Ok(None),
        }
    }

    async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT definition, last_executed_at FROM workflows ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut defs = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = WorkflowDefRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            defs.push(r.into_definition()?);
        }
        Ok(defs)
    }

    async fn delete_definition(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_executed(
        &self,
        id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE workflows SET last_executed_at = ? WHERE id = ?")
            .bind(format_datetime(&at))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        let exec_status = status_str(&record.status)?;

        let input_str = serde_json::to_string(&record.input_context)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let output_str = record
            .output_context
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO workflow_executions
               (id, workflow_id, status, started_at, completed_at,
                input_context, output_context, error, duration_ms)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.workflow_id.to_string())
        .bind(&exec_status)
        .bind(format_datetime(&record.started_at))
        .bind(record.completed_at.as_ref().map(format_datetime))
        .bind(&input_str)
        .bind(&output_str)
        .bind(&record.error)
        .bind(record.duration_ms)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), RepositoryError> {
        let exec_status = status_str(&record.status)?;

        let output_str = record
            .output_context
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Terminal statuses are immutable: the transition applies only while
        // the stored record is still running. A cancelled run must not be
        // overwritten by the background run's own terminal write.
        let result = sqlx::query(
            r#"UPDATE workflow_executions
               SET status = ?, completed_at = ?, output_context = ?, error = ?, duration_ms = ?
               WHERE id = ? AND status = 'running'"#,
        )
        .bind(&exec_status)
        .bind(record.completed_at.as_ref().map(format_datetime))
        .bind(&output_str)
        .bind(&record.error)
        .bind(record.duration_ms)
        .bind(record.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM workflow_executions WHERE id = ?")
                .bind(record.id.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

            if exists.is_none() {
                return Err(RepositoryError::NotFound);
            }

            tracing::debug!(
                execution_id = %record.id,
                "execution already terminal, leaving record untouched"
            );
        }

        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<ExecutionRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflow_executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ExecutionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_executions WHERE workflow_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(workflow_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ExecutionRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            records.push(r.into_record()?);
        }
        Ok(records)
    }

    async fn list_stale_running(&self) -> Result<Vec<ExecutionRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_executions WHERE status = 'running' ORDER BY started_at ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ExecutionRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            records.push(r.into_record()?);
        }
        Ok(records)
    }

    async fn save_step_record(&self, record: &StepRecord) -> Result<(), RepositoryError> {
        let step_status = status_str(&record.status)?;

        sqlx::query(
            r#"INSERT INTO execution_steps
               (id, execution_id, step_id, step_name, status, result, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 result = excluded.result,
                 completed_at = excluded.completed_at"#,
        )
        .bind(record.id.to_string())
        .bind(record.execution_id.to_string())
        .bind(record.step_id.to_string())
        .bind(&record.step_name)
        .bind(&step_status)
        .bind(&record.result)
        .bind(record.started_at.as_ref().map(format_datetime))
        .bind(record.completed_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_step_records(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<StepRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM execution_steps WHERE execution_id = ? ORDER BY started_at ASC",
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = StepRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            records.push(r.into_record()?);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;
    use aiflow_types::workflow::*;
    use serde_json::json;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn sample_definition() -> WorkflowDefinition {
        let now = Utc::now();
        WorkflowDefinition {
            id: Uuid::now_v7(),
            name: "invoice-triage".to_string(),
            description: Some("Classify incoming invoices".to_string()),
            status: WorkflowStatus::Active,
            steps: vec![
                StepDefinition {
                    id: Uuid::now_v7(),
                    name: "Classify".to_string(),
                    order: 1,
                    step_type: StepType::AiProcessing,
                    ai_prompt: Some("Classify this invoice".to_string()),
                    configuration: None,
                },
                StepDefinition {
                    id: Uuid::now_v7(),
                    name: "Notify".to_string(),
                    order: 2,
                    step_type: StepType::Notification,
                    ai_prompt: None,
                    configuration: Some(r#"{"channel":"finance"}"#.to_string()),
                },
            ],
            created_at: now,
            updated_at: now,
            last_executed_at: None,
        }
    }

    fn sample_execution(workflow_id: Uuid) -> ExecutionRecord {
        ExecutionRecord {
            id: Uuid::now_v7(),
            workflow_id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            input_context: json!({"invoice_id": "INV-42"}),
            output_context: None,
            error: None,
            duration_ms: None,
        }
    }

    fn sample_step_record(execution_id: Uuid, step: &StepDefinition) -> StepRecord {
        StepRecord {
            id: Uuid::now_v7(),
            execution_id,
            step_id: step.id,
            step_name: step.name.clone(),
            status: StepStatus::InProgress,
            result: None,
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    // -- Definition CRUD --

    #[tokio::test]
    async fn test_save_and_get_definition() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();

        repo.save_definition(&def).await.unwrap();

        let loaded = repo.get_definition(&def.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "invoice-triage");
        assert_eq!(loaded.status, WorkflowStatus::Active);
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded.steps[0].step_type, StepType::AiProcessing);
    }

    #[tokio::test]
    async fn test_save_definition_upsert() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let mut def = sample_definition();

        repo.save_definition(&def).await.unwrap();

        def.name = "invoice-triage-v2".to_string();
        def.steps.pop();
        repo.save_definition(&def).await.unwrap();

        let loaded = repo.get_definition(&def.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "invoice-triage-v2");
        assert_eq!(loaded.steps.len(), 1);

        let all = repo.list_definitions().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_list_definitions_newest_first() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);

        let mut older = sample_definition();
        older.name = "older".to_string();
        older.created_at = Utc::now() - chrono::Duration::hours(1);

        let mut newer = sample_definition();
        newer.id = Uuid::now_v7();
        newer.name = "newer".to_string();

        repo.save_definition(&older).await.unwrap();
        repo.save_definition(&newer).await.unwrap();

        let all = repo.list_definitions().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "newer");
        assert_eq!(all[1].name, "older");
    }

    #[tokio::test]
    async fn test_delete_definition() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();

        repo.save_definition(&def).await.unwrap();
        let deleted = repo.delete_definition(&def.id).await.unwrap();
        assert!(deleted);

        let gone = repo.get_definition(&def.id).await.unwrap();
        assert!(gone.is_none());

        let again = repo.delete_definition(&def.id).await.unwrap();
        assert!(!again);
    }

    #[tokio::test]
    async fn test_touch_last_executed() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();

        let at = Utc::now();
        repo.touch_last_executed(&def.id, at).await.unwrap();

        let loaded = repo.get_definition(&def.id).await.unwrap().unwrap();
        let stamped = loaded.last_executed_at.unwrap();
        assert!((stamped - at).num_milliseconds().abs() < 1000);

        let missing = repo.touch_last_executed(&Uuid::now_v7(), at).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }

    // -- Execution lifecycle --

    #[tokio::test]
    async fn test_create_and_get_execution() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();

        let exec = sample_execution(def.id);
        repo.create_execution(&exec).await.unwrap();

        let loaded = repo.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.workflow_id, def.id);
        assert_eq!(loaded.status, ExecutionStatus::Running);
        assert_eq!(loaded.input_context["invoice_id"], "INV-42");
        assert!(loaded.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_update_execution_terminal_state() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();

        let mut exec = sample_execution(def.id);
        repo.create_execution(&exec).await.unwrap();

        exec.status = ExecutionStatus::Failed;
        exec.completed_at = Some(Utc::now());
        exec.output_context = Some(json!({"invoice_id": "INV-42", "step_1": "Error: boom"}));
        exec.error = Some("Step failed: Classify - AI call failed".to_string());
        exec.duration_ms = Some(137);
        repo.update_execution(&exec).await.unwrap();

        let loaded = repo.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Failed);
        assert!(loaded.completed_at.is_some());
        assert_eq!(loaded.duration_ms, Some(137));
        assert!(loaded.error.as_deref().unwrap().starts_with("Step failed:"));
        assert_eq!(loaded.output_context.unwrap()["step_1"], "Error: boom");
    }

    #[tokio::test]
    async fn test_terminal_update_does_not_clobber_cancelled() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();

        let mut exec = sample_execution(def.id);
        repo.create_execution(&exec).await.unwrap();

        // User cancels the run
        exec.status = ExecutionStatus::Cancelled;
        exec.completed_at = Some(Utc::now());
        exec.error = Some("Cancelled by user".to_string());
        repo.update_execution(&exec).await.unwrap();

        // The background run later lands its own terminal state
        exec.status = ExecutionStatus::Completed;
        exec.error = None;
        exec.duration_ms = Some(42);
        repo.update_execution(&exec).await.unwrap();

        let loaded = repo.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Cancelled);
        assert_eq!(loaded.error.as_deref(), Some("Cancelled by user"));
        assert!(loaded.duration_ms.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_execution_is_not_found() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);

        let exec = sample_execution(Uuid::now_v7());
        let result = repo.update_execution(&exec).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_executions_respects_limit() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();

        for _ in 0..5 {
            let exec = sample_execution(def.id);
            repo.create_execution(&exec).await.unwrap();
        }

        let all = repo.list_executions(&def.id, 10).await.unwrap();
        assert_eq!(all.len(), 5);

        let capped = repo.list_executions(&def.id, 2).await.unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn test_list_stale_running() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();

        // A run left in running state (simulates crash)
        let stale = sample_execution(def.id);
        repo.create_execution(&stale).await.unwrap();

        // A completed run (should not appear)
        let mut done = sample_execution(def.id);
        done.status = ExecutionStatus::Completed;
        done.completed_at = Some(Utc::now());
        repo.create_execution(&done).await.unwrap();

        let orphans = repo.list_stale_running().await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, stale.id);
    }

    #[tokio::test]
    async fn test_delete_definition_cascades_to_executions() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();

        let exec = sample_execution(def.id);
        repo.create_execution(&exec).await.unwrap();

        repo.delete_definition(&def.id).await.unwrap();

        let gone = repo.get_execution(&exec.id).await.unwrap();
        assert!(gone.is_none());
    }

    // -- Step records --

    #[tokio::test]
    async fn test_save_and_list_step_records() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();
        let exec = sample_execution(def.id);
        repo.create_execution(&exec).await.unwrap();

        let record = sample_step_record(exec.id, &def.steps[0]);
        repo.save_step_record(&record).await.unwrap();

        let records = repo.list_step_records(&exec.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].step_name, "Classify");
        assert_eq!(records[0].status, StepStatus::InProgress);
    }

    #[tokio::test]
    async fn test_save_step_record_upserts_by_id() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();
        let exec = sample_execution(def.id);
        repo.create_execution(&exec).await.unwrap();

        let mut record = sample_step_record(exec.id, &def.steps[0]);
        repo.save_step_record(&record).await.unwrap();

        record.status = StepStatus::Completed;
        record.result = Some("classified as urgent".to_string());
        record.completed_at = Some(Utc::now());
        repo.save_step_record(&record).await.unwrap();

        let records = repo.list_step_records(&exec.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StepStatus::Completed);
        assert_eq!(records[0].result.as_deref(), Some("classified as urgent"));
        assert!(records[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_step_records_ordered_by_start_time() {
        let pool = test_pool().await;
        let repo = SqliteWorkflowRepository::new(pool);
        let def = sample_definition();
        repo.save_definition(&def).await.unwrap();
        let exec = sample_execution(def.id);
        repo.create_execution(&exec).await.unwrap();

        let mut first = sample_step_record(exec.id, &def.steps[0]);
        first.started_at = Some(Utc::now() - chrono::Duration::seconds(10));
        let second = sample_step_record(exec.id, &def.steps[1]);

        // Insert out of order
        repo.save_step_record(&second).await.unwrap();
        repo.save_step_record(&first).await.unwrap();

        let records = repo.list_step_records(&exec.id).await.unwrap();
        assert_eq!(records[0].step_name, "Classify");
        assert_eq!(records[1].step_name, "Notify");
    }
}
