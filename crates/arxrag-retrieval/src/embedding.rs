use arxrag_core::{RagError, RagResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Trait for computing text embeddings (vector representations).
///
/// An empty result is not an error: it means the service produced no
/// embeddings, and callers should proceed with degraded or no retrieval.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embeddings for a batch of texts in one round trip.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Compute the embedding for a single text. Empty when the service
    /// produced nothing.
    async fn embed_one(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        if batch.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(batch.swap_remove(0))
        }
    }
}

/// Connection settings for the remote embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Embedding client for a JSON-over-HTTP service.
///
/// Sends `POST <url>` with the list of texts as the body and accepts either
/// `{"embeddings": [[...], ...]}` or a bare `[[...], ...]` in response.
pub struct HttpEmbeddingClient {
    config: EmbeddingConfig,
    http: reqwest::Client,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    timeout_secs = config.timeout_secs,
                    error = %e,
                    "Failed to build embedding HTTP client, request timeout will not apply"
                );
                reqwest::Client::new()
            });
        Self { config, http }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .http
            .post(&self.config.url)
            .header("Content-Type", "application/json");
        if !self.config.auth_token.is_empty() {
            request = request.bearer_auth(&self.config.auth_token);
        }

        let resp = request
            .json(texts)
            .send()
            .await
            .map_err(|e| RagError::Http(format!("embedding request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Embedding service returned an error status");
            return Ok(Vec::new());
        }

        let body: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding service returned a non-JSON body");
                return Ok(Vec::new());
            }
        };

        match parse_embeddings(&body) {
            Some(embeddings) => {
                debug!(
                    texts = texts.len(),
                    embeddings = embeddings.len(),
                    "Embedded batch"
                );
                Ok(embeddings)
            }
            None => {
                warn!(response = %body, "Unexpected embedding response format");
                Ok(Vec::new())
            }
        }
    }
}

/// Accepts `{"embeddings": [[f32]]}` (a missing field means none) or a bare
/// `[[f32]]`. Returns `None` for any other shape.
pub fn parse_embeddings(body: &serde_json::Value) -> Option<Vec<Vec<f32>>> {
    match body {
        serde_json::Value::Object(map) => match map.get("embeddings") {
            Some(inner) => Vec::<Vec<f32>>::deserialize(inner).ok(),
            None => Some(Vec::new()),
        },
        serde_json::Value::Array(_) => Vec::<Vec<f32>>::deserialize(body).ok(),
        _ => None,
    }
}
