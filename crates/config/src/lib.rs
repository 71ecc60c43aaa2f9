//! Configuration loading, validation, and management for Minerva.
//!
//! Loads configuration from `~/.minerva/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.minerva/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per model reply
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,

    /// How the assistant presents itself
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Budgets and limits of a conversation session
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-2024-08-06".into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_max_completion_tokens() -> u32 {
    1512
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
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .field("identity", &self.identity)
            .field("session", &self.session)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Display name used in the system prompt
    #[serde(default = "default_ai_name")]
    pub ai_name: String,

    /// Platform username; the assistant's own turns are authored under it
    #[serde(default = "default_ai_username")]
    pub ai_username: String,

    /// How participants are mentioned; `{username}` is substituted
    #[serde(default = "default_mention_template")]
    pub mention_template: String,

    /// Extra persona text appended to the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

fn default_ai_name() -> String {
    "Minerva".into()
}
fn default_ai_username() -> String {
    "minerva".into()
}
fn default_mention_template() -> String {
    "@{username}".into()
}

impl IdentityConfig {
    /// Render a mention for `username` using the configured template.
    pub fn mention(&self, username: &str) -> String {
        self.mention_template.replace("{username}", username)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            ai_name: default_ai_name(),
            ai_username: default_ai_username(),
            mention_template: default_mention_template(),
            persona: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Token budget of a conversation history, system prompt included
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,

    /// Malformed replies tolerated per response cycle
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,

    /// Consecutive tool calls allowed per response cycle
    #[serde(default = "default_max_tool_use_count")]
    pub max_tool_use_count: u32,

    /// Platform message size limit, in characters
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Tool output beyond this many tokens is truncated
    #[serde(default = "default_max_tool_response_tokens")]
    pub max_tool_response_tokens: usize,
}

fn default_max_history_tokens() -> usize {
    16384
}
fn default_max_retry_count() -> u32 {
    3
}
fn default_max_tool_use_count() -> u32 {
    5
}
fn default_max_message_length() -> usize {
    2000
}
fn default_max_tool_response_tokens() -> usize {
    2048
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_tokens: default_max_history_tokens(),
            max_retry_count: default_max_retry_count(),
            max_tool_use_count: default_max_tool_use_count(),
            max_message_length: default_max_message_length(),
            max_tool_response_tokens: default_max_tool_response_tokens(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.minerva/config.toml).
    ///
    /// Also checks environment variables:
    /// - `MINERVA_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `MINERVA_MODEL`, then `OPENAI_MODEL`
    /// - `MINERVA_API_URL`, then `OPENAI_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
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

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = env_first(&["MINERVA_API_KEY", "OPENAI_API_KEY"]);
        }
        if let Some(model) = env_first(&["MINERVA_MODEL", "OPENAI_MODEL"]) {
            self.model = model;
        }
        if let Some(url) = env_first(&["MINERVA_API_URL", "OPENAI_BASE_URL"]) {
            self.api_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".minerva")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let session = &self.session;
        if session.max_message_length <= 3 {
            return Err(ConfigError::ValidationError(
                "session.max_message_length must be greater than 3".into(),
            ));
        }
        if session.max_tool_use_count == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_tool_use_count must be at least 1".into(),
            ));
        }
        if session.max_history_tokens == 0 || session.max_tool_response_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "session token budgets must be > 0".into(),
            ));
        }
        if self.max_completion_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_completion_tokens must be > 0".into(),
            ));
        }
        if !self.identity.mention_template.contains("{username}") {
            return Err(ConfigError::ValidationError(
                "identity.mention_template must contain {username}".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
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
            model: default_model(),
            temperature: default_temperature(),
            max_completion_tokens: default_max_completion_tokens(),
            identity: IdentityConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
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
