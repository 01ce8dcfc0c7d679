//! Configuration loading and validation for gavel.
//!
//! Loads configuration from `gavel.toml` in the working directory with
//! environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `gavel.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Data directory and relational store settings
    #[serde(default)]
    pub data: DataConfig,

    /// Conversation history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Control loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("provider", &self.provider)
            .field("data", &self.data)
            .field("history", &self.history)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the chat endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding source tabular files and the relational store
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,

    /// Relational store file name, resolved inside `files_dir`
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("files")
}
fn default_db_file() -> String {
    "judgements.db".into()
}

impl DataConfig {
    /// Full path of the relational store file.
    pub fn db_path(&self) -> PathBuf {
        self.files_dir.join(&self.db_file)
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            files_dir: default_files_dir(),
            db_file: default_db_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Directory holding per-conversation record files
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,

    /// Combined record file name, resolved inside `dir`
    #[serde(default = "default_combined_file")]
    pub combined_file: String,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("history")
}
fn default_combined_file() -> String {
    "chat_history.jsonl".into()
}

impl HistoryConfig {
    /// Full path of the combined record file.
    pub fn combined_path(&self) -> PathBuf {
        self.dir.join(&self.combined_file)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            combined_file: default_combined_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum continue-chain length per inbound message
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    /// Seconds of inactivity before an idle conversation is evicted
    /// from the registry
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_max_cycles() -> u32 {
    10
}
fn default_idle_timeout_secs() -> u64 {
    1800
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `gavel.toml` in the working directory.
    ///
    /// Also checks environment variables:
    /// - `GAVEL_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `GAVEL_BASE_URL`
    /// - `GAVEL_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("gavel.toml"))
    }

    /// Load configuration from a specific file path, then apply
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("GAVEL_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(base_url) = std::env::var("GAVEL_BASE_URL") {
            config.provider.base_url = base_url;
        }

        if let Ok(model) = std::env::var("GAVEL_MODEL") {
            config.provider.model = model;
        }

        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
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

    /// Create the files and history directories if they do not exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data.files_dir)?;
        std::fs::create_dir_all(&self.history.dir)?;
        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_cycles == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_cycles must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            data: DataConfig::default(),
            history: HistoryConfig::default(),
            agent: AgentConfig::default(),
        }
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
