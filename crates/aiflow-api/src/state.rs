//! Application state wiring all services together.
//!
//! The engine is generic over repository and step-executor traits; AppState
//! pins it to the concrete infra implementations. Configuration is loaded
//! once at startup and passed explicitly into constructors.

use std::path::PathBuf;
use std::sync::Arc;

use aiflow_core::engine::{StepRunner, WorkflowEngine};
use aiflow_infra::llm::OpenAiGateway;
use aiflow_infra::sqlite::{DatabasePool, SqliteWorkflowRepository, database_url};
use aiflow_types::config::AiConfig;

/// Concrete engine type pinned to the infra implementations.
pub type ConcreteEngine = WorkflowEngine<SqliteWorkflowRepository, StepRunner<OpenAiGateway>>;

/// Shared application state used by the REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: ConcreteEngine,
    pub workflow_repo: Arc<SqliteWorkflowRepository>,
    pub gateway: Arc<OpenAiGateway>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, wire the
    /// gateway and engine.
    pub async fn init(data_dir: PathBuf, config: AiConfig) -> anyhow::Result<Self> {
        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let workflow_repo = Arc::new(SqliteWorkflowRepository::new(db_pool.clone()));
        let gateway = Arc::new(OpenAiGateway::new(config)?);
        let runner = Arc::new(StepRunner::new(Arc::clone(&gateway)));
        let engine = WorkflowEngine::new(Arc::clone(&workflow_repo), runner);

        Ok(Self {
            engine,
            workflow_repo,
            gateway,
            data_dir,
            db_pool,
        })
    }
}
