
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::ingestion::chunking::ChunkingConfig;

pub const ENV_EMBEDDING_MODE: &str = "EMBEDDING_MODE";
pub const ENV_LM_STUDIO_ENDPOINT: &str = "LM_STUDIO_ENDPOINT";
pub const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_SESSION_EXPIRY_SECONDS: &str = "SESSION_EXPIRY_SECONDS";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Which family of HTTP API the providers speak
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderMode {
    #[default]
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "lm_studio")]
    LmStudio,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderMode {
    pub const ALL: [Self; 3] = [Self::Ollama, Self::LmStudio, Self::OpenRouter];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LmStudio => "lm_studio",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Endpoint used when the mode is selected without one
    #[inline]
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::LmStudio => "http://localhost:1234/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl fmt::Display for ProviderMode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderMode {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| ConfigError::InvalidMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub mode: ProviderMode,
    pub endpoint: String,
    pub embedding_model: String,
    pub generation_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Dimensionality every embedding in a session must share
    pub embedding_dimension: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    /// Upper bound on embedding calls in flight during ingestion
    pub max_concurrency: usize,
    pub temperature: f32,
}

impl Default for ProviderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            mode: ProviderMode::Ollama,
            endpoint: ProviderMode::Ollama.default_endpoint().to_string(),
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.2:latest".to_string(),
            api_key: None,
            embedding_dimension: 768,
            timeout_seconds: 30,
            retry_attempts: 3,
            max_concurrency: 4,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub expiry_seconds: u64,
}

impl Default for SessionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            expiry_seconds: 3600,
        }
    }
}

impl SessionConfig {
    #[inline]
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub max_question_chars: usize,
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            default_top_k: crate::retrieval::DEFAULT_TOP_K,
            max_top_k: 20,
            max_question_chars: 1000,
            snippet_chars: 200,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid provider mode: {0} (must be 'ollama', 'lm_studio' or 'openrouter')")]
    InvalidMode(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid max concurrency: {0} (must be between 1 and 64)")]
    InvalidConcurrency(usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("OpenRouter mode requires an API key")]
    MissingApiKey,
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid session expiry: {0} (must be at least 1 second)")]
    InvalidExpiry(u64),
    #[error("Invalid top-k settings: default {0}, max {1} (need 1 <= default <= max)")]
    InvalidTopK(usize, usize),
    #[error("Invalid max question length: {0} (must be at least 1)")]
    InvalidQuestionLength(usize),
    #[error("Invalid environment value for {0}: {1}")]
    InvalidEnv(&'static str, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".doc-qa"))
            .or_else(|| dirs::data_dir().map(|data| data.join("doc-qa")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the default directory and apply environment overrides
    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        let mut config = Self::read_from(&config_dir)?;
        config
            .apply_env_overrides(|key| std::env::var(key).ok())
            .context("Failed to apply environment overrides")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(config)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when absent
    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config = Self::read_from(config_dir)?;
        config
            .validate()
            .with_context(|| "Configuration validation failed")?;
        Ok(config)
    }

    fn read_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self {
                base_dir: Some(config_dir.as_ref().to_path_buf()),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = Some(config_dir.as_ref().to_path_buf());

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir()?;

        fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Directory holding `config.toml`
    #[inline]
    pub fn get_base_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::config_dir(),
        }
    }

    #[inline]
    pub fn config_file_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.get_base_dir()?.join("config.toml"))
    }

    /// Apply provider mode, endpoint, API key and expiry overrides from the environment.
    ///
    /// `lookup` abstracts the environment so callers and tests can feed values
    /// without touching process state.
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_EMBEDDING_MODE) {
            let mode: ProviderMode = mode.parse()?;
            if mode != self.provider.mode {
                debug!("Provider mode overridden by environment: {}", mode);
                self.provider.mode = mode;
                self.provider.endpoint = mode.default_endpoint().to_string();
            }
        }

        if self.provider.mode == ProviderMode::LmStudio {
            if let Some(endpoint) = lookup(ENV_LM_STUDIO_ENDPOINT) {
                self.provider.endpoint = endpoint;
            }
        }

        if self.provider.mode == ProviderMode::OpenRouter {
            if let Some(key) = lookup(ENV_OPENROUTER_API_KEY) {
                self.provider.api_key = Some(key);
            }
        }

        if let Some(seconds) = lookup(ENV_SESSION_EXPIRY_SECONDS) {
            self.session.expiry_seconds = seconds
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv(ENV_SESSION_EXPIRY_SECONDS, seconds))?;
        }

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.validate_chunking_config()?;
        self.validate_session_config()?;
        self.validate_retrieval_config()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(1..=100_000).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_session_config(&self) -> Result<(), ConfigError> {
        if self.session.expiry_seconds == 0 {
            return Err(ConfigError::InvalidExpiry(self.session.expiry_seconds));
        }
        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        let config = &self.retrieval;

        if config.default_top_k == 0 || config.default_top_k > config.max_top_k {
            return Err(ConfigError::InvalidTopK(
                config.default_top_k,
                config.max_top_k,
            ));
        }

        if config.max_question_chars == 0 {
            return Err(ConfigError::InvalidQuestionLength(
                config.max_question_chars,
            ));
        }

        Ok(())
    }
}

impl ProviderConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.endpoint_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.endpoint.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if !(1..=8192).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        if !(1..=64).contains(&self.max_concurrency) {
            return Err(ConfigError::InvalidConcurrency(self.max_concurrency));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.mode == ProviderMode::OpenRouter
            && self.api_key.as_deref().is_none_or(|key| key.trim().is_empty())
        {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(())
    }

    #[inline]
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(self.endpoint.trim()).map_err(|_| ConfigError::InvalidUrl(self.endpoint.clone()))
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.embedding_dimension as usize
    }

    /// Switch mode, moving the endpoint to the new mode's default
    #[inline]
    pub fn set_mode(&mut self, mode: ProviderMode) {
        if self.mode != mode {
            self.mode = mode;
            self.endpoint = mode.default_endpoint().to_string();
        }
    }

    #[inline]
    pub fn set_endpoint(&mut self, endpoint: String) -> Result<(), ConfigError> {
        let temp_config = ProviderConfig {
            endpoint: endpoint.clone(),
            ..self.clone()
        };
        temp_config.endpoint_url()?;
        self.endpoint = endpoint;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.generation_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(1..=8192).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }

    #[inline]
    pub fn set_max_concurrency(&mut self, max_concurrency: usize) -> Result<(), ConfigError> {
        if !(1..=64).contains(&max_concurrency) {
            return Err(ConfigError::InvalidConcurrency(max_concurrency));
        }
        self.max_concurrency = max_concurrency;
        Ok(())
    }
}
