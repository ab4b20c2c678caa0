pub mod azure;
pub mod openai;

use arxrag_core::{RagError, RagResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// The role of the participant that authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message of a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for chat-completion provider backends.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `LlmBackend` for your struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Wire it up in `LlmClient::new()` in `llm.rs`
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion returning the assistant's text.
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> RagResult<String>;
}

/// Builds the OpenAI-style `messages` array shared by the OpenAI and Azure backends.
pub(crate) fn build_messages(
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
) -> Vec<serde_json::Value> {
    let mut api_messages: Vec<serde_json::Value> = Vec::with_capacity(messages.len() + 1);

    if let Some(sys) = system_prompt {
        api_messages.push(serde_json::json!({
            "role": "system",
            "content": sys
        }));
    }

    for m in messages {
        api_messages.push(serde_json::json!({
            "role": m.role,
            "content": m.content
        }));
    }

    api_messages
}

/// HTTP client with the configured request timeout. Falls back to reqwest
/// defaults, with a warning, if the TLS backend cannot be initialised.
pub(crate) fn http_client(timeout_secs: u64, provider: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(
                provider,
                timeout_secs,
                error = %e,
                "Failed to build HTTP client, request timeout will not apply"
            );
            reqwest::Client::new()
        })
}

/// Sends a prepared request and extracts `choices[0].message.content`.
pub(crate) async fn send_chat(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    provider: &str,
) -> RagResult<String> {
    let resp = request
        .json(body)
        .send()
        .await
        .map_err(|e| RagError::Http(e.to_string()))?;

    let status = resp.status();
    let resp_body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| RagError::Llm(format!("{provider} returned a non-JSON body: {e}")))?;

    if !status.is_success() {
        warn!(provider, status = %status, "Chat completion request failed");
        return Err(RagError::Llm(format!(
            "{provider} API error {status}: {resp_body}"
        )));
    }

    debug!(provider, status = %status, "Chat completion received");
    parse_chat_response(&resp_body)
}

/// Extracts the assistant text from an OpenAI-compatible completion body.
pub fn parse_chat_response(body: &serde_json::Value) -> RagResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RagError::Llm(format!("completion has no message content: {body}")))
}
