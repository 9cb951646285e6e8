//! SQLite storage backends.

pub mod pool;
pub mod workflow;

pub use pool::{DatabasePool, database_url};
pub use workflow::SqliteWorkflowRepository;
