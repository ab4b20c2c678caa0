use arxrag_core::{RagError, RagResult};
use arxrag_llm::ModelConfig;
use arxrag_retrieval::{DatabaseConfig, EmbeddingConfig, RetrievalConfig, RetryPolicy};
use serde::Deserialize;

/// Environment variables that override secrets and endpoints from the file.
pub const ENV_DB_PASSWORD: &str = "ARXRAG_DB_PASSWORD";
pub const ENV_DB_URL: &str = "ARXRAG_DB_URL";
pub const ENV_EMBEDDING_TOKEN: &str = "ARXRAG_EMBEDDING_TOKEN";
pub const ENV_EMBEDDING_URL: &str = "ARXRAG_EMBEDDING_URL";
pub const ENV_LLM_API_KEY: &str = "ARXRAG_LLM_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl RagConfig {
    /// Parses, applies overrides from `env`, and validates.
    pub fn load(text: &str, env: impl Fn(&str) -> Option<String>) -> RagResult<Self> {
        let mut config: RagConfig =
            toml::from_str(text).map_err(|e| RagError::Config(e.to_string()))?;
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env(ENV_DB_PASSWORD) {
            self.database.password = v;
        }
        if let Some(v) = env(ENV_DB_URL) {
            self.database.url = Some(v);
        }
        if let Some(v) = env(ENV_EMBEDDING_TOKEN) {
            self.embedding.auth_token = v;
        }
        if let Some(v) = env(ENV_EMBEDDING_URL) {
            self.embedding.url = v;
        }
        if let Some(v) = env(ENV_LLM_API_KEY) {
            self.model.api_key = v;
        }
    }

    pub fn validate(&self) -> RagResult<()> {
        self.database.validate()?;

        let counts = [
            ("retrieval.num_queries", self.retrieval.num_queries),
            ("retrieval.search_limit", self.retrieval.search_limit),
            ("retrieval.cache_capacity", self.retrieval.cache_capacity),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(RagError::Config(format!("{name} must be at least 1")));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(RagError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.embedding.url.trim().is_empty() {
            return Err(RagError::Config("embedding.url must be set".into()));
        }
        Ok(())
    }
}
