//! Dummy LLM provider — echoes input back prefixed with `[echo]`.
//! Used for exercising the full pipeline without a real API key.

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, content: &str, _system: Option<&str>) -> Result<String, ProviderError> {
        Ok(format!("[echo] {content}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_prefixes_echo() {
        let p = DummyProvider;
        assert_eq!(p.complete("hello", None).await.unwrap(), "[echo] hello");
    }

    #[tokio::test]
    async fn system_prompt_is_ignored() {
        let p = DummyProvider;
        assert_eq!(p.complete("q", Some("sys")).await.unwrap(), "[echo] q");
    }
}
