//! Configuration loading, validation, and management for Dossier.
//!
//! Loads configuration from `~/.dossier/config.toml` with environment
//! variable overrides. Validates all settings at startup; the resulting
//! value is immutable for the life of the process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dossier/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model backend
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Ask the backend for JSON-only output
    #[serde(default)]
    pub json_mode: bool,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Orchestration loop limits
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Document collection settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Report content and output settings
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3:8b".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("json_mode", &self.json_mode)
            .field("providers", &self.providers)
            .field("orchestration", &self.orchestration)
            .field("knowledge", &self.knowledge)
            .field("report", &self.report)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Bounds on a single orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Hard cap on model round-trips per run
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: u32,

    /// Timeout applied to every model call
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Run the tools of one batch concurrently
    #[serde(default = "default_true")]
    pub parallel_tools: bool,
}

fn default_max_round_trips() -> u32 {
    8
}
fn default_model_timeout_secs() -> u64 {
    120
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_round_trips: default_max_round_trips(),
            model_timeout_secs: default_model_timeout_secs(),
            parallel_tools: true,
        }
    }
}

/// Where the documents and figures live and how they are searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory holding source documents and figure assets
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Characters per indexed chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by neighbouring chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Passages returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Length cap on text returned by section extraction
    #[serde(default = "default_max_extract_chars")]
    pub max_extract_chars: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("sample_data")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    4
}
fn default_max_extract_chars() -> usize {
    4000
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            max_extract_chars: default_max_extract_chars(),
        }
    }
}

/// What the report is about and where rendered reports go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Short subject name used in tool queries (e.g. "NAFLD")
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Long description of the domain used in the operating procedure
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Heading of rendered reports
    #[serde(default = "default_title")]
    pub title: String,

    /// Directory for rendered reports
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_subject() -> String {
    "NAFLD".into()
}
fn default_domain() -> String {
    "Non-alcoholic Fatty Liver Disease (NAFLD)".into()
}
fn default_title() -> String {
    "Generated Medical Report: NAFLD Analysis".into()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            domain: default_domain(),
            title: default_title(),
            output_dir: default_output_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.dossier/config.toml).
    ///
    /// Environment overrides:
    /// - `DOSSIER_API_KEY` (then `OPENROUTER_API_KEY`, `OPENAI_API_KEY`)
    /// - `DOSSIER_PROVIDER`
    /// - `DOSSIER_MODEL`
    /// - `DOSSIER_DATA_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("DOSSIER_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("DOSSIER_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("DOSSIER_MODEL") {
            config.default_model = model;
        }

        if let Ok(dir) = std::env::var("DOSSIER_DATA_DIR") {
            config.knowledge.data_dir = PathBuf::from(dir);
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dossier")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.orchestration.max_round_trips == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.max_round_trips must be at least 1".into(),
            ));
        }

        if self.orchestration.model_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.model_timeout_secs must be at least 1".into(),
            ));
        }

        let knowledge = &self.knowledge;
        if knowledge.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_size must be > 0".into(),
            ));
        }
        if knowledge.chunk_overlap >= knowledge.chunk_size {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_overlap must be smaller than knowledge.chunk_size".into(),
            ));
        }
        if knowledge.top_k == 0 || knowledge.max_extract_chars == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k and knowledge.max_extract_chars must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            json_mode: false,
            providers: HashMap::new(),
            orchestration: OrchestrationConfig::default(),
            knowledge: KnowledgeConfig::default(),
            report: ReportConfig::default(),
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
