//! Configuration loading for the triage service
//!
//! Configuration is read from a TOML file. Every section is optional and
//! falls back to its defaults, so an empty file is a valid configuration.

use crate::ai::backends::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_BASE_URL};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub buffer: BufferConfig,
    pub source: SourceConfig,
    pub analysis: AnalysisConfig,
    pub ai: AIConfig,
}

/// Event buffer retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Number of events kept, newest first
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: crate::aggregator::DEFAULT_CAPACITY,
        }
    }
}

/// Synthetic event source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Delay between generated events
    pub interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 3000,
        }
    }
}

impl SourceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Limits applied around the analyzer call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Upper bound on one analyzer call; 0 disables the limit
    pub timeout_seconds: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AIConfig {
    pub backend: AIBackendConfig,
}

/// Analyzer backend selection
///
/// ```toml
/// [ai.backend]
/// type = "gemini"
/// model = "gemini-2.5-flash"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AIBackendConfig {
    Gemini {
        /// Falls back to GEMINI_API_KEY / API_KEY when absent
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default = "default_gemini_base_url")]
        base_url: String,
    },
    OpenAI {
        /// Falls back to OPENAI_API_KEY / API_KEY when absent
        #[serde(default)]
        api_key: Option<String>,
        model: String,
        #[serde(default = "default_openai_base_url")]
        base_url: String,
    },
    Ollama {
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        model: String,
    },
    #[default]
    Mock,
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, a parse
    /// error for malformed TOML, and `ValidationError` for out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "buffer.capacity must be at least 1".to_string(),
            ));
        }
        if self.source.interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "source.interval_ms must be at least 1".to_string(),
            ));
        }

        match &self.ai.backend {
            AIBackendConfig::Gemini { model, base_url, .. }
            | AIBackendConfig::OpenAI { model, base_url, .. } => {
                validate_model(model)?;
                validate_url("ai.backend.base_url", base_url)?;
            }
            AIBackendConfig::Ollama { endpoint, model } => {
                validate_model(model)?;
                validate_url("ai.backend.endpoint", endpoint)?;
            }
            AIBackendConfig::Mock => {}
        }

        Ok(())
    }
}

fn validate_model(model: &str) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "ai.backend.model must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "{} must be an http(s) URL, got '{}'",
            field, url
        )));
    }
    Ok(())
}
