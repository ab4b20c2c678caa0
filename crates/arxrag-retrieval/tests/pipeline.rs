#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests for the retrieval pipeline: a real LLM client and
//! embedding client against mock HTTP servers, and an in-memory vector store.

use arxrag_core::{RagResult, SearchResult};
use arxrag_llm::{LlmClient, LlmProvider, ModelConfig};
use arxrag_retrieval::{
    EmbeddingConfig, HttpEmbeddingClient, LlmQueryExpander, RetrievalConfig, RetrievalEngine,
    VectorStore,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns the rows registered for the vector whose first component matches.
struct MemoryStore {
    rows: Vec<(f32, SearchResult)>,
    searches: AtomicUsize,
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn search_one(&self, vector: &[f32], limit: usize) -> RagResult<Vec<SearchResult>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .iter()
            .filter(|(key, _)| (*key - vector[0]).abs() < f32::EPSILON)
            .map(|(_, row)| row.clone())
            .take(limit)
            .collect())
    }
}

fn paper(title: &str, category: &str, body: &str) -> SearchResult {
    SearchResult {
        title: title.into(),
        category: category.into(),
        abstract_text: body.into(),
    }
}

async fn llm_server(reply: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .mount(&server)
        .await;
    server
}

async fn embedding_server(body: serde_json::Value, expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

fn build_engine(llm: &MockServer, embed: &MockServer, store: Arc<MemoryStore>) -> RetrievalEngine {
    let llm = LlmClient::new(ModelConfig {
        provider: LlmProvider::OpenAi,
        model_id: "gpt-4.1-mini".into(),
        api_key: "test".into(),
        api_base_url: Some(llm.uri()),
        api_version: None,
        temperature: 0.0,
        max_tokens: 256,
        timeout_secs: 5,
    });
    let embedder = HttpEmbeddingClient::new(EmbeddingConfig {
        url: format!("{}/embed", embed.uri()),
        auth_token: "token".into(),
        timeout_secs: 5,
    });
    RetrievalEngine::new(
        Arc::new(LlmQueryExpander::new(Arc::new(llm))),
        Arc::new(embedder),
        store,
        RetrievalConfig::default(),
    )
}

#[tokio::test]
async fn test_retrieve_merges_and_dedupes_across_variants() {
    let llm = llm_server(r#"["brownian motion", "wiener process"]"#).await;
    let embed = embedding_server(json!({"embeddings": [[1.0, 0.0], [2.0, 0.0]]}), 1).await;
    let store = Arc::new(MemoryStore {
        rows: vec![
            (1.0, paper("Brownian Motion", "math.PR", "Einstein's 1905 paper")),
            (1.0, paper("Random Walks", "math.PR", "Scaling limits")),
            (2.0, paper("Brownian Motion", "math.PR", "Einstein's 1905 paper")),
            (2.0, paper("Wiener Measure", "math.PR", "Construction on C[0,1]")),
        ],
        searches: AtomicUsize::new(0),
    });
    let engine = build_engine(&llm, &embed, store.clone());

    let docs = engine.retrieve("brownian motion").await;
    let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["Brownian Motion", "Random Walks", "Wiener Measure"]);
    assert_eq!(store.searches.load(Ordering::SeqCst), 2);

    // Served from cache: no second embedding call (checked by `expect(1)`).
    assert_eq!(engine.retrieve("brownian motion").await, docs);
}

#[tokio::test]
async fn test_malformed_expansion_still_searches_original_query() {
    let llm = llm_server("Sure! Here are some search terms: brownian, wiener").await;
    let embed = embedding_server(json!([[1.0]]), 1).await;
    let store = Arc::new(MemoryStore {
        rows: vec![(1.0, paper("Brownian Motion", "math.PR", "abstract"))],
        searches: AtomicUsize::new(0),
    });
    let engine = build_engine(&llm, &embed, store.clone());

    assert_eq!(engine.retrieve("brownian motion").await.len(), 1);
    assert_eq!(store.searches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_embedding_outage_yields_no_documents() {
    let llm = llm_server(r#"["a", "b"]"#).await;
    let embed = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&embed)
        .await;
    let store = Arc::new(MemoryStore {
        rows: vec![(0.0, paper("t", "c", "b"))],
        searches: AtomicUsize::new(0),
    });
    let engine = build_engine(&llm, &embed, store.clone());

    assert!(engine.retrieve("q").await.is_empty());
    assert_eq!(store.searches.load(Ordering::SeqCst), 0);
}
