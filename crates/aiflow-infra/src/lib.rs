//! Infrastructure layer for Aiflow.
//!
//! Contains implementations of the ports defined in `aiflow-core`: SQLite
//! storage for workflows and executions, the OpenAI-compatible completion
//! gateway, and the configuration loader.

pub mod config;
pub mod llm;
pub mod sqlite;
