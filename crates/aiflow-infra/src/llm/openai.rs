//! OpenAiGateway -- concrete [`CompletionGateway`] for OpenAI-compatible APIs.
//!
//! Sends chat-completion requests to `{base_url}/chat/completions` with a
//! fixed business-automation system prompt. Calls are retried with a fixed
//! delay and bounded by an overall deadline.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use aiflow_core::llm::CompletionGateway;
use aiflow_types::config::AiConfig;
use aiflow_types::llm::{
    ChatCompletionRequest, ChatCompletionResponse, LlmError, Message, MessageRole,
};

/// System prompt sent with every completion request.
const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in business process automation. \
     Provide clear, actionable responses in JSON format when possible.";

/// OpenAI-compatible completion gateway.
///
/// Implements [`CompletionGateway`] over the `/chat/completions` endpoint.
/// Retry policy: `max_retries` retries after the initial attempt with a fixed
/// `retry_delay_ms` pause, all bounded by a single `timeout_secs` deadline
/// that preempts remaining attempts.
pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_retries: u32,
    retry_delay: Duration,
    timeout: Duration,
    enable_logging: bool,
}

// OpenAiGateway intentionally does NOT derive Debug. The SecretString field
// ensures the API key is never printed, but we also omit Debug entirely so
// internal state cannot leak through formatting.

impl OpenAiGateway {
    /// Create a new gateway from configuration.
    pub fn new(config: AiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key,
            base_url: config.base_url,
            model: config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs),
            enable_logging: config.enable_logging,
        })
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn build_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: MessageRole::User,
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// One HTTP round trip, no retry policy.
    async fn attempt(&self, body: &ChatCompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("failed to parse response: {e}")))?;

        match completion.choices.first() {
            Some(choice) => Ok(choice.message.content.clone()),
            None => Err(LlmError::Parse("response contained no choices".to_string())),
        }
    }

    /// Retry loop: initial attempt plus `max_retries` retries with fixed delay.
    async fn complete_with_retries(&self, body: &ChatCompletionRequest) -> Result<String, LlmError> {
        let total_attempts = self.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=total_attempts {
            match self.attempt(body).await {
                Ok(content) => {
                    if self.enable_logging {
                        tracing::info!(attempt, chars = content.len(), "completion succeeded");
                    }
                    return Ok(content);
                }
                Err(err) => {
                    tracing::warn!(attempt, total_attempts, error = %err, "completion attempt failed");
                    last_error = Some(err);
                    if attempt < total_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        // total_attempts >= 1, so at least one error was recorded
        Err(last_error.unwrap_or_else(|| LlmError::Request("no attempts made".to_string())))
    }
}

impl CompletionGateway for OpenAiGateway {
    async fn complete(
        &self,
        prompt: &str,
        context: &HashMap<String, Value>,
    ) -> Result<String, LlmError> {
        if self.enable_logging {
            tracing::info!(
                prompt_chars = prompt.len(),
                context_entries = context.len(),
                "sending completion request"
            );
        }

        let body = self.build_request(prompt);

        match tokio::time::timeout(self.timeout, self.complete_with_retries(&body)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
