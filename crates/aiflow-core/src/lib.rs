//! Workflow engine and repository trait definitions for Aiflow.
//!
//! This crate defines the "ports" (repository and gateway traits) that the
//! infrastructure layer implements, plus the sequential workflow engine
//! itself. It depends only on `aiflow-types` -- never on `aiflow-infra` or
//! any database/IO crate.

pub mod engine;
pub mod llm;
pub mod repository;
