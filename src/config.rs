//! Player configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Generation backend settings.
#[derive(Debug, Clone, PartialEq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into, strip_option)]
pub struct AiConfig {
    /// Provider name, looked up in the provider registry.
    #[serde(default = "default_provider")]
    provider: String,

    /// Model name as the provider spells it.
    #[serde(default = "default_model")]
    model: String,

    /// API key. Falls back to the provider's environment variable when unset.
    #[serde(default)]
    api_key: Option<String>,

    /// Base URL override for OpenAI-compatible providers.
    #[serde(default)]
    base_url: Option<String>,

    /// Maximum tokens per response.
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    temperature: f32,
}

/// Play-style settings.
#[derive(Debug, Clone, PartialEq, Default, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into)]
pub struct GameConfig {
    /// Free-form personality description.
    #[serde(default)]
    personality: String,

    /// Strategy label (`aggressive`, `conservative`, `balanced`, ...).
    #[serde(default)]
    strategy: Option<String>,
}

/// Logging switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emits the human-readable start-game summary.
    #[serde(default = "default_logging_enabled")]
    enabled: bool,
}

/// Configuration of one player agent.
#[derive(Debug, Clone, PartialEq, Default, Getters, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Backend settings.
    #[serde(default)]
    ai: AiConfig,

    /// Play-style settings.
    #[serde(default)]
    game: GameConfig,

    /// Logging switches.
    #[serde(default)]
    logging: LoggingConfig,
}

#[instrument]
fn default_provider() -> String {
    "openrouter".to_string()
}

#[instrument]
fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

#[instrument]
fn default_max_tokens() -> u32 {
    1000
}

#[instrument]
fn default_temperature() -> f32 {
    0.8
}

#[instrument]
fn default_logging_enabled() -> bool {
    true
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
        }
    }
}

impl LoggingConfig {
    /// Creates logging settings.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl PlayerConfig {
    /// Creates a configuration from its three sections.
    #[instrument(skip(ai), fields(provider = %ai.provider, model = %ai.model))]
    pub fn new(ai: AiConfig, game: GameConfig, logging: LoggingConfig) -> Self {
        Self { ai, game, logging }
    }

    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(
            provider = %config.ai.provider,
            model = %config.ai.model,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Serializes this configuration to TOML with the API key redacted.
    #[instrument(skip(self))]
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        if redacted.ai.api_key.is_some() {
            redacted.ai.api_key = Some("***".to_string());
        }
        toml::to_string_pretty(&redacted)
            .map_err(|e| ConfigError::new(format!("Failed to serialize config: {}", e)))
    }

    /// Applies `AI_API_KEY`, `AI_PROVIDER`, `AI_MODEL` and `AI_BASE_URL`
    /// from the environment on top of this configuration.
    #[instrument(skip(self))]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("AI_API_KEY") {
            debug!("Using AI_API_KEY from environment");
            self.ai.api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("AI_PROVIDER") {
            debug!(provider = %provider, "Using AI_PROVIDER from environment");
            self.ai.provider = provider;
        }
        if let Ok(model) = std::env::var("AI_MODEL") {
            debug!(model = %model, "Using AI_MODEL from environment");
            self.ai.model = model;
        }
        if let Ok(base_url) = std::env::var("AI_BASE_URL") {
            debug!(base_url = %base_url, "Using AI_BASE_URL from environment");
            self.ai.base_url = Some(base_url);
        }
        self
    }

    /// Returns a copy whose personality is replaced, all else inherited.
    ///
    /// `None` or an empty string keeps the current personality.
    #[instrument(skip(self))]
    pub fn with_personality(&self, personality: Option<&str>) -> Self {
        let mut merged = self.clone();
        if let Some(p) = personality.filter(|p| !p.is_empty()) {
            merged.game.personality = p.to_string();
        }
        merged
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
