//! Configuration for pluggable backends.
//!
//! Each capability has its own section. Absence of `endpoint` selects the
//! local implementation; no runtime type inspection is involved. Config
//! can be loaded from a TOML file via [`load_config`] or assembled from
//! environment variables via [`Config::from_env`]; env vars always win
//! over file values when both paths are combined by the caller.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Combined configuration for all backends.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Configuration for tokenizer backends.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_tokenizer_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Configuration for reranker backends.
#[derive(Debug, Deserialize, Clone)]
pub struct RerankerConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_reranker_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Request/response wire shape: `cohere`, `openai`, or `custom`.
    #[serde(default = "default_format")]
    pub format: String,
}

/// Configuration for chunker backends.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkerConfig {
    /// `regex` (local structural) or `semantic` (remote embeddings).
    #[serde(default = "default_chunker_mode")]
    pub mode: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_reranker_timeout")]
    pub timeout_secs: u64,
    /// Cosine-similarity threshold in `[0, 1]`; lower means more splits.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Configuration for the LLM-backed query parser.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_tokenizer_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "default".to_string()
}
fn default_embedding_model() -> String {
    "all-mpnet-base-v1".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_format() -> String {
    "cohere".to_string()
}
fn default_chunker_mode() -> String {
    "regex".to_string()
}
fn default_tokenizer_timeout() -> u64 {
    30
}
fn default_reranker_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_llm_retries() -> u32 {
    2
}
fn default_threshold() -> f32 {
    0.5
}
fn default_temperature() -> f64 {
    0.0
}
fn default_llm_max_tokens() -> u32 {
    256
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_model(),
            api_key: None,
            timeout_secs: default_tokenizer_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_model(),
            api_key: None,
            timeout_secs: default_reranker_timeout(),
            max_retries: default_max_retries(),
            format: default_format(),
        }
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            mode: default_chunker_mode(),
            endpoint: None,
            model: default_embedding_model(),
            api_key: None,
            timeout_secs: default_reranker_timeout(),
            threshold: default_threshold(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_llm_model(),
            api_key: None,
            timeout_secs: default_tokenizer_timeout(),
            max_retries: default_llm_retries(),
            temperature: default_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl TokenizerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            endpoint: env_string("TOKENIZER_ENDPOINT"),
            model: env_string("TOKENIZER_MODEL").unwrap_or(d.model),
            api_key: env_string("TOKENIZER_API_KEY"),
            timeout_secs: env_parse("TOKENIZER_TIMEOUT", d.timeout_secs),
            max_retries: env_parse("TOKENIZER_MAX_RETRIES", d.max_retries),
        }
    }
}

impl RerankerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            endpoint: env_string("RERANKER_ENDPOINT"),
            model: env_string("RERANKER_MODEL").unwrap_or(d.model),
            api_key: env_string("RERANKER_API_KEY"),
            timeout_secs: env_parse("RERANKER_TIMEOUT", d.timeout_secs),
            max_retries: env_parse("RERANKER_MAX_RETRIES", d.max_retries),
            format: env_string("RERANKER_FORMAT").unwrap_or(d.format),
        }
    }
}

impl ChunkerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            mode: env_string("CHUNKER_MODE").unwrap_or(d.mode),
            endpoint: env_string("CHUNKER_ENDPOINT"),
            model: env_string("CHUNKER_MODEL").unwrap_or(d.model),
            api_key: env_string("CHUNKER_API_KEY"),
            timeout_secs: env_parse("CHUNKER_TIMEOUT", d.timeout_secs),
            threshold: env_parse("CHUNKER_THRESHOLD", d.threshold),
            max_retries: env_parse("CHUNKER_MAX_RETRIES", d.max_retries),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            endpoint: env_string("LLM_ENDPOINT"),
            model: env_string("LLM_MODEL").unwrap_or(d.model),
            api_key: env_string("LLM_API_KEY"),
            timeout_secs: env_parse("LLM_TIMEOUT", d.timeout_secs),
            max_retries: env_parse("LLM_MAX_RETRIES", d.max_retries),
            temperature: env_parse("LLM_TEMPERATURE", d.temperature),
            max_tokens: env_parse("LLM_MAX_TOKENS", d.max_tokens),
        }
    }
}

impl Config {
    /// Assemble the full configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            tokenizer: TokenizerConfig::from_env(),
            reranker: RerankerConfig::from_env(),
            chunker: ChunkerConfig::from_env(),
            llm: LlmConfig::from_env(),
        }
    }
}

/// Validate a configuration, rejecting malformed input at the boundary
/// so the core algorithms can assume well-formed parameters.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.tokenizer.timeout_secs == 0 {
        anyhow::bail!("tokenizer.timeout_secs must be > 0");
    }
    if config.reranker.timeout_secs == 0 {
        anyhow::bail!("reranker.timeout_secs must be > 0");
    }
    if config.chunker.timeout_secs == 0 {
        anyhow::bail!("chunker.timeout_secs must be > 0");
    }

    match config.reranker.format.as_str() {
        "cohere" | "openai" | "custom" => {}
        other => anyhow::bail!(
            "Unknown reranker format: '{}'. Must be cohere, openai, or custom.",
            other
        ),
    }

    match config.chunker.mode.as_str() {
        "regex" | "semantic" => {}
        other => anyhow::bail!("Unknown chunker mode: '{}'. Must be regex or semantic.", other),
    }

    if !(0.0..=1.0).contains(&config.chunker.threshold) {
        anyhow::bail!("chunker.threshold must be in [0.0, 1.0]");
    }

    Ok(())
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;

    Ok(config)
}
