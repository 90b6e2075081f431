//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory — called once at engine
//! construction. Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a provider from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models. Returns `Ok(None)` when no provider is
/// configured — the engine then runs on the heuristic tiers alone.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<Option<LlmProvider>, ProviderError> {
    match config.provider.as_str() {
        "none" | "" => Ok(None),
        "dummy" => Ok(Some(LlmProvider::Dummy(dummy::DummyProvider))),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(Some(LlmProvider::OpenAiCompatible(p)))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
