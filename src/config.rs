//! Configuration management for chatweave
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::chat::{default_models, ModelCatalog, ModelConfig, ModelEntry, SummarizeModels};
use crate::error::{ChatweaveError, Result};
use crate::summarize::SummarizeSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for chatweave
///
/// Holds the remote history service and model endpoint settings, the
/// application defaults, the global model configuration and the state
/// file location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote chat history service
    #[serde(default)]
    pub remote: RemoteConfig,
    /// OpenAI-compatible model endpoint
    #[serde(default)]
    pub model_client: ModelClientConfig,
    /// Application behavior
    #[serde(default)]
    pub app: AppConfig,
    /// Global default model configuration for new sessions
    #[serde(default)]
    pub model: ModelConfig,
    /// Persisted state location
    #[serde(default)]
    pub state: StateConfig,
}

/// Remote chat history service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the history service
    #[serde(default = "default_remote_url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_seconds: u64,
}

fn default_remote_url() -> String {
    "https://cloak.i.inc".to_string()
}

fn default_remote_timeout() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_url(),
            auth_token: None,
            timeout_seconds: default_remote_timeout(),
        }
    }
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelClientConfig {
    /// Base URL up to and including the API version segment
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_timeout() -> u64 {
    120
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            api_key: None,
            timeout_seconds: default_api_timeout(),
        }
    }
}

/// Application behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generate session titles automatically
    #[serde(default = "default_true")]
    pub enable_auto_generate_title: bool,

    /// Built-in model catalog
    #[serde(default = "default_models")]
    pub models: Vec<ModelEntry>,

    /// Comma separated catalog edits (`+name`, `-name`, `name=Display`, `-all`, `+all`)
    #[serde(default)]
    pub custom_models: String,

    /// Model used to summarize GPT-family sessions
    #[serde(default = "default_summarize_model")]
    pub summarize_model: String,

    /// Model used to summarize Gemini-family sessions
    #[serde(default = "default_gemini_summarize_model")]
    pub gemini_summarize_model: String,

    /// Language injected into system prompts
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Seconds a deleted session can be restored
    #[serde(default = "default_undo_window")]
    pub undo_window_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_summarize_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_gemini_summarize_model() -> String {
    "gemini-pro".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_undo_window() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_auto_generate_title: default_true(),
            models: default_models(),
            custom_models: String::new(),
            summarize_model: default_summarize_model(),
            gemini_summarize_model: default_gemini_summarize_model(),
            lang: default_lang(),
            undo_window_seconds: default_undo_window(),
        }
    }
}

impl AppConfig {
    /// Catalog after applying `custom_models`
    pub fn catalog(&self) -> ModelCatalog {
        ModelCatalog::new(self.models.clone(), &self.custom_models)
    }

    /// Summarization models by family
    pub fn summarize_models(&self) -> SummarizeModels {
        SummarizeModels {
            gpt: self.summarize_model.clone(),
            gemini: self.gemini_summarize_model.clone(),
        }
    }

    /// Settings consumed by the title and memory planners
    pub fn summarize_settings(&self) -> SummarizeSettings {
        SummarizeSettings {
            auto_title: self.enable_auto_generate_title,
            catalog: self.catalog(),
            models: self.summarize_models(),
        }
    }

    /// Undo window as a duration
    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_window_seconds)
    }
}

/// Persisted state configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// Path of the JSON state file
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StateConfig {
    /// Configured path, or `state.json` in the platform data directory
    ///
    /// Falls back to `./chatweave-state.json` when no home directory can be
    /// determined.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "chatweave")
            .map(|dirs| dirs.data_dir().join("state.json"))
            .unwrap_or_else(|| PathBuf::from("chatweave-state.json"))
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatweaveError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatweaveError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("CHATWEAVE_REMOTE_URL") {
            self.remote.base_url = url;
        }

        if let Ok(token) = std::env::var("CHATWEAVE_AUTH_TOKEN") {
            self.remote.auth_token = Some(token);
        }

        if let Ok(url) = std::env::var("CHATWEAVE_API_URL") {
            self.model_client.base_url = url;
        }

        if let Ok(key) = std::env::var("CHATWEAVE_API_KEY") {
            self.model_client.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("CHATWEAVE_MODEL") {
            self.model.model = model;
        }

        if let Ok(max_tokens) = std::env::var("CHATWEAVE_MAX_TOKENS") {
            if let Ok(value) = max_tokens.parse() {
                self.model.max_tokens = value;
            } else {
                tracing::warn!("Invalid CHATWEAVE_MAX_TOKENS: {}", max_tokens);
            }
        }

        if let Ok(count) = std::env::var("CHATWEAVE_HISTORY_COUNT") {
            if let Ok(value) = count.parse() {
                self.model.history_message_count = value;
            } else {
                tracing::warn!("Invalid CHATWEAVE_HISTORY_COUNT: {}", count);
            }
        }

        if let Ok(path) = std::env::var("CHATWEAVE_STATE") {
            self.state.path = Some(PathBuf::from(path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(path) = &cli.state {
            self.state.path = Some(path.clone());
        }

        if let Some(model) = &cli.model {
            self.model.model = model.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.model.max_tokens == 0 {
            return Err(
                ChatweaveError::Config("model.max_tokens must be greater than 0".to_string()).into(),
            );
        }

        if self.model.model.trim().is_empty() {
            return Err(ChatweaveError::Config("model.model cannot be empty".to_string()).into());
        }

        validate_http_url("remote.base_url", &self.remote.base_url)?;
        validate_http_url("model_client.base_url", &self.model_client.base_url)?;

        if self.remote.timeout_seconds == 0 || self.model_client.timeout_seconds == 0 {
            return Err(
                ChatweaveError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        if self.app.undo_window_seconds == 0 {
            return Err(ChatweaveError::Config(
                "app.undo_window_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ChatweaveError::Config(format!("{} is not a valid URL: {}", field, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ChatweaveError::Config(format!(
            "{} must use http or https, got {}",
            field, other
        ))
        .into()),
    }
}
