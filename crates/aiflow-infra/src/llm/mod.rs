//! LLM gateway implementations.

pub mod openai;

pub use openai::OpenAiGateway;
