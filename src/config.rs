//! Configuration loading with env-var overrides.
//!
//! Reads a TOML file (default `config/default.toml` relative to the current
//! working directory), then applies `TABLECHAT_LOG_LEVEL` env override.
//! The LLM API key is sourced from the `LLM_API_KEY` env var only, never
//! from TOML.

use std::{env, fs, path::Path};

use serde::Deserialize;

use crate::error::AppError;

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"none"`, `"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    /// Config for the OpenAI / OpenAI-compatible provider (`[llm.openai]`).
    pub openai: OpenAiConfig,
}

/// Fully-resolved engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Prepend the executed SQL to answers (transparency mode) and record
    /// it as the turn's trace.
    pub show_query: bool,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var — `None` for keyless local models.
    pub llm_api_key: Option<String>,
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    engine: RawEngine,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawEngine {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_false")]
    show_query: bool,
}

impl Default for RawEngine {
    fn default() -> Self {
        Self { log_level: default_log_level(), show_query: false }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_llm_provider() -> String { "none".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.0 }
fn default_openai_timeout_seconds() -> u64 { 60 }

fn default_false() -> bool {
    false
}

/// Load config from `config/default.toml`, then apply env-var overrides.
/// A missing file yields all defaults — the engine runs without any TOML.
pub fn load() -> Result<Config, AppError> {
    let log_level_override = env::var("TABLECHAT_LOG_LEVEL").ok();
    load_from(Path::new("config/default.toml"), log_level_override.as_deref())
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, log_level_override: Option<&str>) -> Result<Config, AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let parsed: RawConfig = if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?
    } else {
        RawConfig::default()
    };

    let log_level = log_level_override
        .map(|s| s.to_string())
        .unwrap_or(parsed.engine.log_level);

    Ok(Config {
        log_level,
        show_query: parsed.engine.show_query,
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — no provider, no API keys, no external calls.
impl Config {
    pub fn test_default() -> Self {
        Self {
            log_level: "info".into(),
            show_query: false,
            llm: LlmConfig {
                provider: "none".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}
