//! Background evaluation of answered queries.
//!
//! Callers hand finished interactions to an [`EvaluationHandle`]; a single
//! worker task scores them with an [`Evaluator`] and persists the scores
//! through a [`MetricsSink`]. Submission never blocks and never fails the
//! caller. Errors inside the worker are logged and the job is dropped.

use crate::pg::{PgVectorStore, SqlParam};
use arxrag_core::{Document, RagResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of the job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One answered interaction awaiting evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    pub query: String,
    pub output: String,
    pub documents: Vec<Document>,
    /// Names of the tools the agent invoked while answering.
    #[serde(default)]
    pub tools_used: Vec<String>,
}

impl EvaluationJob {
    /// Retrieval context as plain text, one entry per document. Falls back
    /// to `"title [category]"` for documents without a body.
    pub fn context(&self) -> Vec<String> {
        self.documents
            .iter()
            .filter_map(|doc| {
                if !doc.body.is_empty() {
                    Some(doc.body.clone())
                } else if !doc.title.is_empty() || !doc.category.is_empty() {
                    Some(format!("{} [{}]", doc.title, doc.category))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Scores an interaction. Returns a JSON object keyed by metric name.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, job: &EvaluationJob) -> RagResult<serde_json::Value>;
}

/// Persists evaluation results.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(&self, job: &EvaluationJob, metrics: &serde_json::Value) -> RagResult<()>;
}

/// Writes `(query, output, metrics)` rows into the configured metrics table.
pub struct PgMetricsSink {
    store: Arc<PgVectorStore>,
    insert_sql: String,
}

impl PgMetricsSink {
    pub fn new(store: Arc<PgVectorStore>) -> Self {
        let insert_sql = format!(
            "INSERT INTO {} (query, output, metrics) VALUES ($1, $2, $3::jsonb)",
            store.config().metrics_table
        );
        Self { store, insert_sql }
    }
}

#[async_trait]
impl MetricsSink for PgMetricsSink {
    async fn record(&self, job: &EvaluationJob, metrics: &serde_json::Value) -> RagResult<()> {
        self.store
            .execute(
                &self.insert_sql,
                &[
                    SqlParam::Text(job.query.clone()),
                    SqlParam::Text(job.output.clone()),
                    SqlParam::Json(metrics.clone()),
                ],
            )
            .await?;
        Ok(())
    }
}

/// Sending half of the evaluation queue.
pub struct EvaluationHandle {
    tx: mpsc::Sender<EvaluationJob>,
    worker: JoinHandle<()>,
}

impl EvaluationHandle {
    /// Queues a job. Returns `false` if the queue is full or the worker is
    /// gone; the job is dropped in that case.
    pub fn submit(&self, job: EvaluationJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(query = %job.query, "Evaluation queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(query = %job.query, "Evaluation worker stopped, dropping job");
                false
            }
        }
    }

    /// Stops accepting jobs and waits until every queued job is processed.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Evaluation worker terminated abnormally");
        }
    }
}

/// Spawns the evaluation worker on the current runtime.
pub fn spawn_evaluation_worker(
    evaluator: Arc<dyn Evaluator>,
    sink: Arc<dyn MetricsSink>,
    capacity: usize,
) -> EvaluationHandle {
    let (tx, mut rx) = mpsc::channel::<EvaluationJob>(capacity.max(1));

    let worker = tokio::spawn(async move {
        info!("Evaluation worker started");
        while let Some(job) = rx.recv().await {
            let metrics = match evaluator.evaluate(&job).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(query = %job.query, error = %e, "Evaluation failed");
                    continue;
                }
            };

            match sink.record(&job, &metrics).await {
                Ok(()) => debug!(query = %job.query, "Evaluation metrics recorded"),
                Err(e) => warn!(query = %job.query, error = %e, "Failed to record evaluation metrics"),
            }
        }
        info!("Evaluation worker stopped");
    });

    EvaluationHandle { tx, worker }
}
