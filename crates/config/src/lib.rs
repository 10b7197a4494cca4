//! Configuration loading, validation, and management for Delve.
//!
//! Loads configuration from `~/.delve/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.delve/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible completion endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on model calls per run. Unset means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Replaces the built-in research system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Research store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}
fn default_model() -> String {
    "gemini-2.5-pro".into()
}
fn default_temperature() -> f32 {
    0.6
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("max_iterations", &self.max_iterations)
            .field(
                "system_prompt_override",
                &self.system_prompt_override.as_ref().map(|p| p.len()),
            )
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("transcription", &self.transcription)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Largest accepted request body for `/transcribe`
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How many records `GET /research` returns
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

fn default_store_path() -> PathBuf {
    AppConfig::config_dir().join("research.db")
}
fn default_list_limit() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            list_limit: default_list_limit(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_transcription_url")]
    pub api_url: String,

    #[serde(default = "default_transcription_model")]
    pub default_model: String,

    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_transcription_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_transcription_model() -> String {
    "whisper-large-v3".into()
}
fn default_language() -> String {
    "en".into()
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_transcription_url(),
            default_model: default_transcription_model(),
            default_language: default_language(),
        }
    }
}

impl std::fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_language", &self.default_language)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.delve/config.toml).
    ///
    /// Environment variables override the file:
    /// - `DELVE_API_KEY`, then `GEMINI_API_KEY`, then `OPENAI_API_KEY`
    /// - `DELVE_MODEL`, `DELVE_API_URL`, `DELVE_DB_PATH`
    /// - `GROQ_API_KEY` for transcription
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load from an explicit file when given, otherwise the default path,
    /// then apply environment overrides.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_dir().join("config.toml"),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("DELVE_API_KEY")
            .or_else(|| var("GEMINI_API_KEY"))
            .or_else(|| var("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(model) = var("DELVE_MODEL") {
            self.default_model = model;
        }

        if let Some(url) = var("DELVE_API_URL") {
            self.api_url = url;
        }

        if let Some(path) = var("DELVE_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }

        if let Some(key) = var("GROQ_API_KEY") {
            self.transcription.api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".delve")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be non-zero".into(),
            ));
        }

        if self.gateway.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_upload_bytes must be non-zero".into(),
            ));
        }

        if self.max_iterations == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_iterations: None,
            system_prompt_override: None,
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            transcription: TranscriptionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for delve_core::Error {
    fn from(e: ConfigError) -> Self {
        delve_core::Error::Config {
            message: e.to_string(),
        }
    }
}
