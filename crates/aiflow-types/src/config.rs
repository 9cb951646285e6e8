//! AI configuration types for Aiflow.
//!
//! `AiConfig` represents the `config.toml` block that controls the completion
//! gateway: provider endpoint, model parameters, retry and timeout policy.
//! The struct is passed explicitly into constructors; there is no ambient
//! global configuration.

use secrecy::SecretString;
use serde::Deserialize;

/// Configuration for the AI completion gateway.
///
/// Loaded from `{data_dir}/config.toml`. All fields have defaults so a
/// missing or partial file still yields a usable config. The API key is
/// wrapped in [`SecretString`] and never appears in logs or Debug output.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Provider API key. Empty by default; usually supplied via environment.
    #[serde(default = "default_api_key")]
    pub api_key: SecretString,

    /// Base URL of the OpenAI-compatible provider.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every completion request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Number of retries after the initial attempt (total attempts = retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retry attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Overall deadline for a single gateway call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether to install the tracing subscriber at startup.
    #[serde(default = "default_enable_logging")]
    pub enable_logging: bool,
}

fn default_api_key() -> SecretString {
    SecretString::from("")
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_enable_logging() -> bool {
    true
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            enable_logging: default_enable_logging(),
        }
    }
}
