//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` (or an explicit path),
//! with a `.env` file and environment variables layered on top. The three
//! provider credentials have no defaults: [`AppConfig::require_credentials`]
//! fails fast when any of them is missing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable holding the language-model credential.
pub const ENV_MODEL_API_KEY: &str = "OPENAI_API_KEY";
/// Legacy spelling of the model credential variable, read as a fallback.
pub const ENV_MODEL_API_KEY_LEGACY: &str = "OPENAI-API";
/// Environment variable holding the weather-provider credential.
pub const ENV_WEATHER_API_KEY: &str = "OPENWEATHER_API_KEY";
/// Environment variable holding the stock-quote credential.
pub const ENV_STOCK_API_KEY: &str = "ALPHAVANTAGE_API_KEY";
pub const ENV_MODEL: &str = "PARLEY_MODEL";
pub const ENV_DB: &str = "PARLEY_DB";

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model adapter settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Control loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool settings and credentials
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Checkpoint storage
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_model_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool round-trips per turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Wall-clock budget for one whole turn
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,

    /// Run the calls of one tool request concurrently
    #[serde(default = "default_true")]
    pub parallel_tools: bool,

    /// Sent ahead of the history on every model call; never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_tool_rounds() -> u32 {
    10
}
fn default_turn_timeout() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            turn_timeout_secs: default_turn_timeout(),
            parallel_tools: true,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout for any tool
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub weather: WeatherToolConfig,

    #[serde(default)]
    pub stock: StockToolConfig,

    #[serde(default)]
    pub search: SearchToolConfig,
}

fn default_tool_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            weather: WeatherToolConfig::default(),
            stock: StockToolConfig::default(),
            search: SearchToolConfig::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WeatherToolConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".into()
}

impl Default for WeatherToolConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
        }
    }
}

impl std::fmt::Debug for WeatherToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherToolConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StockToolConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_stock_base_url")]
    pub base_url: String,
}

fn default_stock_base_url() -> String {
    "https://www.alphavantage.co".into()
}

impl Default for StockToolConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_stock_base_url(),
        }
    }
}

impl std::fmt::Debug for StockToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockToolConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchToolConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    #[serde(default = "default_search_region")]
    pub region: String,

    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

fn default_search_base_url() -> String {
    "https://api.duckduckgo.com".into()
}
fn default_search_region() -> String {
    "us-en".into()
}
fn default_search_max_results() -> usize {
    5
}

impl Default for SearchToolConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            region: default_search_region(),
            max_results: default_search_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "chatbot.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an explicit file, or `~/.parley/config.toml`
    /// when `None`.
    ///
    /// These variables override the file. The process environment wins over
    /// a `.env` file in the working directory:
    /// - `OPENAI_API_KEY` (or `OPENAI-API`, process environment only)
    /// - `OPENWEATHER_API_KEY`
    /// - `ALPHAVANTAGE_API_KEY`
    /// - `PARLEY_MODEL`, `PARLEY_DB`
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let dotenv = read_env_file(Path::new(".env"));

        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_dir().join("config.toml"),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()));
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

    /// Apply environment overrides using the given lookup.
    ///
    /// Credentials from the environment win over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_MODEL_API_KEY).or_else(|| non_empty(ENV_MODEL_API_KEY_LEGACY)) {
            self.model.api_key = Some(key);
        }
        if let Some(key) = non_empty(ENV_WEATHER_API_KEY) {
            self.tools.weather.api_key = Some(key);
        }
        if let Some(key) = non_empty(ENV_STOCK_API_KEY) {
            self.tools.stock.api_key = Some(key);
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.model.model = model;
        }
        if let Some(db) = non_empty(ENV_DB) {
            self.store.path = db;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_rounds must be at least 1".into(),
            ));
        }
        if self.agent.turn_timeout_secs == 0
            || self.tools.timeout_secs == 0
            || self.model.request_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than zero".into(),
            ));
        }
        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store.backend '{}' (expected \"sqlite\" or \"memory\")",
                self.store.backend
            )));
        }
        Ok(())
    }

    /// Fail unless all three provider credentials are configured.
    pub fn require_credentials(&self) -> Result<Credentials, ConfigError> {
        fn required(value: &Option<String>, name: &'static str, env_var: &'static str) -> Result<String, ConfigError> {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential { name, env_var })
        }

        Ok(Credentials {
            model_api_key: required(&self.model.api_key, "model.api_key", ENV_MODEL_API_KEY)?,
            weather_api_key: required(&self.tools.weather.api_key, "tools.weather.api_key", ENV_WEATHER_API_KEY)?,
            stock_api_key: required(&self.tools.stock.api_key, "tools.stock.api_key", ENV_STOCK_API_KEY)?,
        })
    }

}

/// The resolved provider credentials.
#[derive(Clone)]
pub struct Credentials {
    pub model_api_key: String,
    pub weather_api_key: String,
    pub stock_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

/// Read `KEY=value` pairs from a `.env` file; a missing file is empty.
///
/// Lines dotenvy cannot parse are skipped with a warning and the rest of the
/// file still loads. Keys may only use letters, digits, `_` and `.`, so the
/// legacy `OPENAI-API` name has to come from the process environment.
fn read_env_file(path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return vars,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Ignoring unreadable .env file: {e}");
            return vars;
        }
    };
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => tracing::warn!(path = %path.display(), "Skipping .env line: {e}"),
        }
    }
    tracing::debug!(path = %path.display(), count = vars.len(), "Loaded .env variables");
    vars
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

    #[error("Missing credential {name}: set {env_var} or add it to the config file")]
    MissingCredential { name: &'static str, env_var: &'static str },
}
