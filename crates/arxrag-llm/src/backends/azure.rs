use super::{build_messages, http_client, send_chat, ChatMessage, LlmBackend};
use crate::config::ModelConfig;
use arxrag_core::{RagError, RagResult};
use async_trait::async_trait;

/// Azure OpenAI deployment backend.
///
/// Requests go to `{endpoint}/openai/deployments/{deployment}/chat/completions`
/// and authenticate with an `api-key` header instead of a bearer token.
pub struct AzureOpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl AzureOpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        let http = http_client(config.timeout_secs, "Azure");
        Self { config, http }
    }

    fn deployment_url(&self) -> RagResult<String> {
        let endpoint = self.config.base_url();
        if endpoint.is_empty() {
            return Err(RagError::Config(
                "Azure provider requires api_base_url (the resource endpoint)".into(),
            ));
        }
        Ok(format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint,
            self.config.model_id,
            self.config.api_version()
        ))
    }
}

#[async_trait]
impl LlmBackend for AzureOpenAiBackend {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> RagResult<String> {
        let url = self.deployment_url()?;

        // The deployment pins the model; no "model" field in the body.
        let body = serde_json::json!({
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": build_messages(system_prompt, messages),
        });

        let request = self
            .http
            .post(&url)
            .header("api-key", &self.config.api_key)
            .header("Content-Type", "application/json");
        send_chat(request, &body, "Azure OpenAI").await
    }
}
