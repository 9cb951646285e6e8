//! LLM gateway abstractions and prompt helpers.

pub mod assist;
pub mod gateway;

pub use gateway::CompletionGateway;
