use arxrag_core::{RagResult, SearchResult};
use async_trait::async_trait;
use futures_util::future::try_join_all;

/// Trait for nearest-neighbor document search backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `limit` rows closest to `vector`, ordered by ascending distance.
    async fn search_one(&self, vector: &[f32], limit: usize) -> RagResult<Vec<SearchResult>>;

    /// Runs one [`search_one`](Self::search_one) per vector concurrently and
    /// flattens the per-vector lists in submission order. Does not
    /// deduplicate across vectors. The first failure fails the batch.
    async fn search_batch(
        &self,
        vectors: &[Vec<f32>],
        limit: usize,
    ) -> RagResult<Vec<SearchResult>> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let searches = vectors.iter().map(|v| self.search_one(v, limit));
        let per_vector = try_join_all(searches).await?;
        Ok(per_vector.into_iter().flatten().collect())
    }
}
