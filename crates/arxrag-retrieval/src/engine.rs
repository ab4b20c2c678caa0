//! Multi-query retrieval orchestrator.
//!
//! [`RetrievalEngine::retrieve`] runs a fixed pipeline for each query:
//!
//! 1. expand the query into search variants (falls back to the query itself),
//! 2. embed every variant in one batch request,
//! 3. run one nearest-neighbor search per embedding, concurrently,
//! 4. drop duplicate documents, keeping first occurrences in order.
//!
//! The whole pipeline sits behind a [`RetrievalCache`] keyed by the exact
//! query string, so a burst of identical queries triggers one pipeline run.
//! `retrieve` never fails: any error or panic inside the pipeline becomes an
//! empty list.

use crate::cache::RetrievalCache;
use crate::embedding::EmbeddingProvider;
use crate::query_expansion::QueryExpander;
use crate::store::VectorStore;
use arxrag_core::{dedupe, Document, RagResult};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pipeline tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of query variants requested from the expander.
    #[serde(default = "default_num_queries")]
    pub num_queries: usize,
    /// Rows fetched per variant.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Optional expiry for cached results. Unset means capacity-only eviction.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

fn default_num_queries() -> usize {
    5
}
fn default_search_limit() -> usize {
    5
}
fn default_cache_capacity() -> usize {
    128
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_queries: default_num_queries(),
            search_limit: default_search_limit(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: None,
        }
    }
}

pub struct RetrievalEngine {
    expander: Arc<dyn QueryExpander>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    cache: RetrievalCache<Vec<Document>>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        expander: Arc<dyn QueryExpander>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        let ttl = config.cache_ttl_secs.map(Duration::from_secs);
        Self {
            expander,
            embedder,
            store,
            cache: RetrievalCache::new(config.cache_capacity, ttl),
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn cache(&self) -> &RetrievalCache<Vec<Document>> {
        &self.cache
    }

    /// Documents relevant to `query`. Empty when nothing matched or when
    /// any stage failed; the two cases are deliberately indistinguishable.
    pub async fn retrieve(&self, query: &str) -> Vec<Document> {
        let cached = self
            .cache
            .get_or_try_compute(query, || self.run_pipeline(query));

        match AssertUnwindSafe(cached).catch_unwind().await {
            Ok(Ok(documents)) => documents,
            Ok(Err(e)) => {
                warn!(query, error = %e, "Retrieval failed, returning no documents");
                Vec::new()
            }
            Err(_) => {
                warn!(query, "Retrieval panicked, returning no documents");
                Vec::new()
            }
        }
    }

    async fn run_pipeline(&self, query: &str) -> RagResult<Vec<Document>> {
        let variants = self.expander.expand(query, self.config.num_queries).await;
        debug!(query, variants = variants.len(), "Expanded query");

        let vectors = self.embedder.embed_batch(&variants).await?;
        if vectors.is_empty() {
            info!(query, "No embeddings produced, skipping search");
            return Ok(Vec::new());
        }

        let rows = self
            .store
            .search_batch(&vectors, self.config.search_limit)
            .await?;
        let fetched = rows.len();
        let documents = dedupe(rows.into_iter().map(Document::from));

        info!(
            query,
            fetched,
            unique = documents.len(),
            "Retrieved documents"
        );
        Ok(documents)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arxrag_core::{RagError, SearchResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedExpander {
        variants: Vec<String>,
        calls: AtomicUsize,
        delay: Duration,
        panics: bool,
    }

    impl FixedExpander {
        fn new(variants: &[&str]) -> Self {
            Self {
                variants: variants.iter().map(|v| (*v).to_string()).collect(),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                panics: false,
            }
        }
    }

    #[async_trait]
    impl QueryExpander for FixedExpander {
        async fn expand(&self, query: &str, _count: usize) -> Vec<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic!("expander exploded");
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.variants.is_empty() {
                vec![query.to_string()]
            } else {
                self.variants.clone()
            }
        }
    }

    /// One-dimensional embedding: the index of each text.
    struct IndexEmbedder {
        empty: bool,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl IndexEmbedder {
        fn new() -> Self {
            Self {
                empty: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for IndexEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            self.seen.lock().push(texts.to_vec());
            if self.empty {
                return Ok(Vec::new());
            }
            Ok((0..texts.len()).map(|i| vec![i as f32]).collect())
        }
    }

    struct ScriptedStore {
        per_vector: Vec<Vec<SearchResult>>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedStore {
        fn new(per_vector: Vec<Vec<SearchResult>>) -> Self {
            Self {
                per_vector,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl VectorStore for ScriptedStore {
        async fn search_one(&self, vector: &[f32], limit: usize) -> RagResult<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RagError::Database("connection reset".into()));
            }
            let mut rows = self
                .per_vector
                .get(vector[0] as usize)
                .cloned()
                .unwrap_or_default();
            rows.truncate(limit);
            Ok(rows)
        }
    }

    fn row(title: &str, body: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            category: "math.PR".into(),
            abstract_text: body.into(),
        }
    }

    fn engine(
        expander: Arc<FixedExpander>,
        embedder: Arc<IndexEmbedder>,
        store: Arc<ScriptedStore>,
    ) -> RetrievalEngine {
        RetrievalEngine::new(expander, embedder, store, RetrievalConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_queries_run_pipeline_once() {
        let mut expander = FixedExpander::new(&["brownian motion", "wiener process"]);
        expander.delay = Duration::from_millis(500);
        let expander = Arc::new(expander);
        let embedder = Arc::new(IndexEmbedder::new());
        let store = Arc::new(ScriptedStore::new(vec![
            vec![row("Brownian Motion", "A continuous-time stochastic process")],
            vec![row("Wiener Measure", "Construction of the Wiener measure")],
        ]));
        let engine = Arc::new(engine(expander.clone(), embedder.clone(), store.clone()));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.retrieve("brownian motion").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().len(), 2);
        }
        assert_eq!(expander.calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.seen.lock().len(), 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_embeddings_skip_search() {
        let embedder = Arc::new(IndexEmbedder {
            empty: true,
            seen: Mutex::new(Vec::new()),
        });
        let store = Arc::new(ScriptedStore::new(vec![vec![row("t", "b")]]));
        let engine = engine(
            Arc::new(FixedExpander::new(&["a", "b"])),
            embedder,
            store.clone(),
        );

        assert!(engine.retrieve("q").await.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_variants_are_embedded_in_one_batch() {
        let embedder = Arc::new(IndexEmbedder::new());
        let engine = engine(
            Arc::new(FixedExpander::new(&["a", "b", "c"])),
            embedder.clone(),
            Arc::new(ScriptedStore::new(Vec::new())),
        );
        engine.retrieve("q").await;
        assert_eq!(*embedder.seen.lock(), vec![vec!["a", "b", "c"]]);
    }

    #[tokio::test]
    async fn test_duplicates_across_variants_are_removed() {
        let store = Arc::new(ScriptedStore::new(vec![
            vec![row("A", "t1"), row("B", "t2")],
            vec![row("A", "t1"), row("C", "t3")],
        ]));
        let engine = engine(
            Arc::new(FixedExpander::new(&["v1", "v2"])),
            Arc::new(IndexEmbedder::new()),
            store,
        );

        let titles: Vec<String> = engine
            .retrieve("q")
            .await
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_store_failure_returns_empty_and_is_not_cached() {
        let mut store = ScriptedStore::new(vec![vec![row("A", "t1")]]);
        store.fail = true;
        let store = Arc::new(store);
        let expander = Arc::new(FixedExpander::new(&["v1"]));
        let engine = engine(expander.clone(), Arc::new(IndexEmbedder::new()), store);

        assert!(engine.retrieve("q").await.is_empty());
        assert!(engine.retrieve("q").await.is_empty());
        assert_eq!(expander.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panic_inside_pipeline_returns_empty() {
        let mut expander = FixedExpander::new(&[]);
        expander.panics = true;
        let engine = engine(
            Arc::new(expander),
            Arc::new(IndexEmbedder::new()),
            Arc::new(ScriptedStore::new(Vec::new())),
        );
        assert!(engine.retrieve("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_cached_per_query() {
        let expander = Arc::new(FixedExpander::new(&[]));
        let engine = engine(
            expander.clone(),
            Arc::new(IndexEmbedder::new()),
            Arc::new(ScriptedStore::new(vec![vec![row("A", "t1")]])),
        );

        assert_eq!(engine.retrieve("q").await.len(), 1);
        assert_eq!(engine.retrieve("q").await.len(), 1);
        engine.retrieve("other").await;
        assert_eq!(expander.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.cache().len(), 2);
    }

    #[test]
    fn test_config_defaults() {
        let config: RetrievalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RetrievalConfig::default());
        assert_eq!(config.num_queries, 5);
        assert_eq!(config.search_limit, 5);
        assert_eq!(config.cache_capacity, 128);
        assert!(config.cache_ttl_secs.is_none());
    }
}
