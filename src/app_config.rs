use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::file_utils::FileManager;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO) or name
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO) or name
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Oracle provider settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Outbound call cap
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Batch partitioning and worker pool
    #[serde(default)]
    pub batch: BatchConfig,

    /// Per-item retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Progress store
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Groq (OpenAI-compatible)
    #[default]
    Groq,
    // @provider: OpenAI
    OpenAI,
    // @provider: Maritaca (OpenAI-compatible)
    Maritaca,
    // @provider: Ollama
    Ollama,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Groq => "Groq",
            Self::OpenAI => "OpenAI",
            Self::Maritaca => "Maritaca",
            Self::Ollama => "Ollama",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Groq => "groq".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Maritaca => "maritaca".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }

    // @returns: Environment variable holding the API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("GROQ_API_KEY"),
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Maritaca => Some("MARITACA_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }

    pub fn all() -> [Self; 4] {
        [Self::Groq, Self::OpenAI, Self::Maritaca, Self::Ollama]
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAI),
            "maritaca" => Ok(Self::Maritaca),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key; empty means read `api_key_env`
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Environment variable for the API key
    #[serde(default = "String::new")]
    pub api_key_env: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: Cap on generated tokens, provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(provider_type),
            api_key: String::new(),
            api_key_env: provider_type.api_key_env().unwrap_or_default().to_string(),
            endpoint: default_endpoint(provider_type),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Recover the last JSON object from chatty replies.
    /// `None` uses the per-pipeline default (on for multiple choice).
    #[serde(default)]
    pub lenient_json: Option<bool>,
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Mutable configuration of the active provider, inserted with defaults if missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(position) => &mut self.available_providers[position],
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                let last = self.available_providers.len() - 1;
                &mut self.available_providers[last]
            }
        }
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.model.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model(self.provider))
    }

    /// Get the API key for the active provider: config value first, then environment
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
            if !provider_config.api_key_env.is_empty() {
                if let Ok(key) = std::env::var(&provider_config.api_key_env) {
                    return key.trim().to_string();
                }
            }
        }

        self.provider
            .api_key_env()
            .and_then(|name| std::env::var(name).ok())
            .map(|key| key.trim().to_string())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.endpoint.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_endpoint(self.provider))
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout(&self) -> Duration {
        let secs = self
            .get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|s| *s > 0)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Get the sampling temperature for the active provider
    pub fn get_temperature(&self) -> f32 {
        self.get_active_provider_config()
            .map(|p| p.temperature)
            .unwrap_or_else(default_temperature)
    }

    /// Get the generated-token cap for the active provider
    pub fn get_max_tokens(&self) -> Option<u32> {
        self.get_active_provider_config().and_then(|p| p.max_tokens)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: TranslationProvider::all().into_iter().map(ProviderConfig::new).collect(),
            lenient_json: None,
        }
    }
}

/// At most `max_calls` oracle calls start in any `period_secs` window
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            period_secs: default_period_secs(),
        }
    }
}

/// Batch partitioning and worker pool size
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
        }
    }
}

/// Delay growth between attempts
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// base * 2^(attempt - 1)
    #[default]
    Exponential,
    /// base on every attempt
    Fixed,
}

/// Per-item retry settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub strategy: BackoffStrategy,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Uniform random extra delay in `[0, jitter_ms]`
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            strategy: BackoffStrategy::default(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ms: 0,
        }
    }
}

/// Progress store backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// One JSON file per record
    #[default]
    Files,
    /// One SQLite database
    Sqlite,
}

/// Progress store location
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            dir: default_cache_dir(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "pt".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_calls() -> usize {
    30
}

fn default_period_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    10
}

fn default_workers() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000 // doubled on each retry with the exponential strategy
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("translated_data")
}

fn default_endpoint(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Groq => "https://api.groq.com/openai/v1",
        TranslationProvider::OpenAI => "https://api.openai.com/v1",
        TranslationProvider::Maritaca => "https://chat.maritaca.ai/api",
        TranslationProvider::Ollama => "http://localhost:11434",
    }
    .to_string()
}

fn default_model(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Groq => "llama-3.3-70b-versatile",
        TranslationProvider::OpenAI => "gpt-4o-mini",
        TranslationProvider::Maritaca => "sabia-3",
        TranslationProvider::Ollama => "llama3.2:3b",
    }
    .to_string()
}

impl Config {
    /// Load a config file, or write the default one when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if FileManager::file_exists(path) {
            let content = FileManager::read_to_string(path)?;
            let config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok((config, false));
        }

        let config = Config::default();
        config.save(path)?;
        Ok((config, true))
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        FileManager::write_to_file(path, &json)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        for language in [&self.source_language, &self.target_language] {
            if language.trim().is_empty() {
                return Err(anyhow!("Source and target languages must not be empty"));
            }
        }
        if crate::language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!(
                "Source and target language are the same: {} / {}",
                self.source_language,
                self.target_language
            ));
        }

        if self.rate_limit.max_calls == 0 || self.rate_limit.period_secs == 0 {
            return Err(anyhow!("rate_limit.max_calls and rate_limit.period_secs must be positive"));
        }
        if self.batch.batch_size == 0 || self.batch.workers == 0 {
            return Err(anyhow!("batch.batch_size and batch.workers must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_base_ms == 0 {
            return Err(anyhow!("retry.backoff_base_ms must be positive"));
        }
        if self.retry.max_backoff_ms < self.retry.backoff_base_ms {
            return Err(anyhow!(
                "retry.max_backoff_ms ({}) must not be below retry.backoff_base_ms ({})",
                self.retry.max_backoff_ms,
                self.retry.backoff_base_ms
            ));
        }

        let endpoint = self.translation.get_endpoint();
        url::Url::parse(&endpoint).with_context(|| format!("Invalid provider endpoint: {}", endpoint))?;

        let provider = self.translation.provider;
        if provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider (set it in the config or {})",
                provider.display_name(),
                provider.api_key_env().unwrap_or_default()
            ));
        }

        Ok(())
    }

    /// Rate limit period as a duration
    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit.period_secs)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            rate_limit: RateLimitConfig::default(),
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
