//! CompletionGateway trait definition.
//!
//! This is the seam between the engine and the AI provider. The engine only
//! ever needs a prompt in and a text completion out; everything else
//! (endpoint, retries, timeouts) is the gateway's concern.

use std::collections::HashMap;

use aiflow_types::llm::LlmError;
use serde_json::Value;

/// Trait for AI completion backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// The production implementation lives in aiflow-infra (`OpenAiGateway`);
/// tests script their own.
pub trait CompletionGateway: Send + Sync {
    /// Send a prompt and receive the completion text.
    ///
    /// `context` carries the current execution context for gateways that
    /// want to enrich or log the request; the base implementation sends
    /// only the prompt.
    fn complete(
        &self,
        prompt: &str,
        context: &HashMap<String, Value>,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}
