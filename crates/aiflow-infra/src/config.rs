//! Configuration loader for Aiflow.
//!
//! Reads `config.toml` from the data directory (`~/.aiflow/` in production)
//! and deserializes it into [`AiConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies environment overrides so
//! deployments can supply the API key without writing it to disk.

use std::path::{Path, PathBuf};

use aiflow_types::config::AiConfig;
use secrecy::SecretString;

/// Resolve the data directory.
///
/// `AIFLOW_DATA_DIR` wins when set; otherwise `~/.aiflow`.
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var("AIFLOW_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aiflow"),
    }
}

/// Load AI configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AiConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Environment variables override the file in either case:
///   `AIFLOW_API_KEY`, `AIFLOW_BASE_URL`, `AIFLOW_MODEL`.
pub async fn load_ai_config(data_dir: &Path) -> AiConfig {
    let config_path = data_dir.join("config.toml");

    let mut config = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => match toml::from_str::<AiConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}: {err}, using defaults",
                    config_path.display()
                );
                AiConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            AiConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            AiConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    config
}

fn apply_env_overrides(config: &mut AiConfig) {
    if let Ok(api_key) = std::env::var("AIFLOW_API_KEY") {
        config.api_key = SecretString::from(api_key);
    }
    if let Ok(base_url) = std::env::var("AIFLOW_BASE_URL") {
        config.base_url = base_url;
    }
    if let Ok(model) = std::env::var("AIFLOW_MODEL") {
        config.model = model;
    }
}
