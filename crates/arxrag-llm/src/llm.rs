use crate::backends::azure::AzureOpenAiBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::{ChatMessage, LlmBackend};
use crate::config::{LlmProvider, ModelConfig};
use arxrag_core::RagResult;
use async_trait::async_trait;

/// LLM client that dispatches to the correct provider backend.
///
/// Uses the `LlmBackend` trait to abstract away provider-specific API differences.
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        let backend: Box<dyn LlmBackend> = match config.provider {
            LlmProvider::Azure => Box::new(AzureOpenAiBackend::new(config)),
            LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
                Box::new(OpenAiBackend::new(config))
            }
        };
        Self { backend }
    }

    /// Create from a pre-built backend (for custom/external providers).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> RagResult<String> {
        self.backend.complete(system_prompt, messages).await
    }
}
