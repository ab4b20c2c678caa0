//! Multi-query retrieval engine for arxrag.
//!
//! Turns a user question into a de-duplicated list of [`Document`]s:
//! the question is expanded into several search variants by a language
//! model, the variants are embedded in one batch, each embedding drives a
//! concurrent nearest-neighbor search against Postgres/pgvector, and the
//! merged results are de-duplicated in order.
//!
//! # Main types
//!
//! - [`RetrievalEngine`] — Orchestrates the pipeline behind a single-flight cache.
//! - [`QueryExpander`] / [`LlmQueryExpander`] — Query variant generation.
//! - [`EmbeddingProvider`] / [`HttpEmbeddingClient`] — Batched text embeddings.
//! - [`VectorStore`] / [`PgVectorStore`] — Nearest-neighbor search and pool lifecycle.
//! - [`RetryPolicy`] — Bounded exponential backoff for transient database errors.
//! - [`RetrievalCache`] — LRU cache with one in-flight computation per key.
//! - [`EvaluationHandle`] — Non-blocking hand-off of answered queries to a scoring worker.
//!
//! [`Document`]: arxrag_core::Document

/// Single-flight LRU result cache.
pub mod cache;
/// Embedding service client.
pub mod embedding;
/// Retrieval pipeline orchestrator.
pub mod engine;
/// Background evaluation worker.
pub mod evaluation;
/// Postgres + pgvector store.
pub mod pg;
/// LLM-driven query expansion.
pub mod query_expansion;
/// Retry policy for transient failures.
pub mod retry;
/// Vector store trait.
pub mod store;

pub use cache::RetrievalCache;
pub use embedding::{EmbeddingConfig, EmbeddingProvider, HttpEmbeddingClient};
pub use engine::{RetrievalConfig, RetrievalEngine};
pub use evaluation::{
    spawn_evaluation_worker, EvaluationHandle, EvaluationJob, Evaluator, MetricsSink,
    PgMetricsSink,
};
pub use pg::{DatabaseConfig, PgVectorStore, SqlParam};
pub use query_expansion::{LlmQueryExpander, QueryExpander};
pub use retry::RetryPolicy;
pub use store::VectorStore;
