//! Shared domain types for Aiflow.
//!
//! This crate contains the core domain types used across the Aiflow platform:
//! workflow definitions, execution records, LLM wire shapes, configuration,
//! and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! secrecy.

pub mod config;
pub mod error;
pub mod llm;
pub mod workflow;
