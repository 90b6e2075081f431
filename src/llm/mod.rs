//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Enum dispatch keeps `complete` an `async fn` without trait-object
//! machinery. The engine uses one provider for both NL-to-SQL generation
//! and result summarization; both treat the reply as untrusted text.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `content` as the user message (plus an optional system prompt)
    /// and return the provider's text reply.
    pub async fn complete(&self, content: &str, system: Option<&str>) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(content, system).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(content, system).await,
        }
    }
}
