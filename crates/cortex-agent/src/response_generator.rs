use async_trait::async_trait;
use cortex_core::error::Result;
use cortex_llm::LanguageModelClient;

/// The spoken-response collaborator (§4.8 step 9). Kept as a trait so tests
/// can substitute a canned generator instead of calling out to a real
/// language model endpoint.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Default implementation: reuses the same language-model client the
/// cognitive loop already holds for thought generation.
pub struct LlmResponseGenerator {
    llm: std::sync::Arc<LanguageModelClient>,
}

impl LlmResponseGenerator {
    pub fn new(llm: std::sync::Arc<LanguageModelClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ResponseGenerator for LlmResponseGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.llm.generate(prompt).await
    }
}

#[cfg(test)]
pub struct StubResponseGenerator {
    pub reply: String,
}

#[cfg(test)]
#[async_trait]
impl ResponseGenerator for StubResponseGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.reply.clone())
    }
}
