//! Configuration loading, validation, and management for Wela.
//!
//! Loads configuration from `~/.wela/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wela_core::{Param, SamplingParams, StopSequences};

/// The root configuration structure.
///
/// Maps directly to `~/.wela/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the chat-completions endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base endpoint, e.g. `https://api.openai.com/v1`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Whether the model streams fragments instead of complete messages
    #[serde(default)]
    pub stream: bool,

    /// Sampling settings (each omitted from requests when unset)
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Turn loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
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
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("stream", &self.stream)
            .field("sampling", &self.sampling)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

impl SamplingConfig {
    /// Unset knobs stay out of the request body.
    pub fn to_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: Param::from(self.temperature),
            top_p: Param::from(self.top_p),
            frequency_penalty: Param::from(self.frequency_penalty),
            presence_penalty: Param::from(self.presence_penalty),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model calls per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Prepended as a system message to every conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> usize {
    5
}

impl AgentConfig {
    pub fn stop_sequences(&self) -> Option<StopSequences> {
        match self.stop.as_slice() {
            [] => None,
            [one] => Some(StopSequences::One(one.clone())),
            many => Some(StopSequences::Many(many.to_vec())),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tokens: None,
            stop: vec![],
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Names of the built-in tools to register, in order
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,

    /// HTTP(S) proxy used by network-backed tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    /// Instant-answer endpoint behind `get_definition`
    #[serde(default = "default_definition_base_url")]
    pub definition_base_url: String,
}

fn default_enabled_tools() -> Vec<String> {
    vec![
        "get_weather_forecast".into(),
        "duckduckgo_search".into(),
        "set_alarm_clock".into(),
        "quit".into(),
    ]
}
fn default_weather_base_url() -> String {
    "https://wttr.in".into()
}
fn default_search_base_url() -> String {
    "https://html.duckduckgo.com".into()
}
fn default_definition_base_url() -> String {
    "https://api.duckduckgo.com".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            proxy: None,
            weather_base_url: default_weather_base_url(),
            search_base_url: default_search_base_url(),
            definition_base_url: default_definition_base_url(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.wela/config.toml).
    ///
    /// Environment overrides, which beat values from the file:
    /// - `WELA_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `WELA_BASE_URL`
    /// - `WELA_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("WELA_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(base_url) = var("WELA_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(model) = var("WELA_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wela")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("sampling.temperature", self.sampling.temperature, 0.0, 2.0)?;
        check_range("sampling.top_p", self.sampling.top_p, 0.0, 1.0)?;
        check_range(
            "sampling.frequency_penalty",
            self.sampling.frequency_penalty,
            -2.0,
            2.0,
        )?;
        check_range(
            "sampling.presence_penalty",
            self.sampling.presence_penalty,
            -2.0,
            2.0,
        )?;

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
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

fn check_range(field: &str, value: Option<f32>, min: f32, max: f32) -> Result<(), ConfigError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ConfigError::ValidationError(format!(
            "{field} must be between {min} and {max}"
        ))),
        _ => Ok(()),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            stream: false,
            sampling: SamplingConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
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
