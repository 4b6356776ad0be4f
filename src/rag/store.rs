//! VectorStore trait and the in-memory brute-force implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::mmr::maximal_marginal_relevance;
use super::splitter::Chunk;
use crate::llm::LlmError;
use crate::vector_math::{cosine_similarity, rank_descending_by_cosine};

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),
    #[error("embedding dimension mismatch: index uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("{chunks} chunks but {vectors} vectors")]
    CountMismatch { chunks: usize, vectors: usize },
    #[error("index cache error: {0}")]
    Cache(String),
}

/// A retrieved chunk with its similarity to the query (higher is better).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert_batch(&self, items: Vec<(Chunk, Vec<f32>)>) -> Result<(), VectorStoreError>;

    /// Top `k` chunks by cosine similarity.
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ChunkSearchResult>, VectorStoreError>;

    /// `fetch_k` nearest chunks re-ranked by maximal marginal relevance down to `k`.
    async fn max_marginal_relevance_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<ChunkSearchResult>, VectorStoreError>;

    async fn count(&self) -> usize;

    async fn clear(&self);

    /// Copy of every entry; the index builder writes it to the on-disk cache.
    async fn snapshot(&self) -> Vec<(Chunk, Vec<f32>)>;
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_dimension(expected: usize, actual: usize) -> Result<(), VectorStoreError> {
    if expected != actual {
        return Err(VectorStoreError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_batch(&self, items: Vec<(Chunk, Vec<f32>)>) -> Result<(), VectorStoreError> {
        let mut entries = self.entries.write().await;
        let expected = entries
            .first()
            .map(|(_, v)| v.len())
            .or_else(|| items.first().map(|(_, v)| v.len()));

        if let Some(expected) = expected {
            for (_, vector) in &items {
                check_dimension(expected, vector.len())?;
            }
        }
        entries.extend(items);
        Ok(())
    }

    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ChunkSearchResult>, VectorStoreError> {
        let entries = self.entries.read().await;
        if let Some((_, first)) = entries.first() {
            check_dimension(first.len(), query_embedding.len())?;
        }

        let results = entries
            .iter()
            .map(|(chunk, vector)| ChunkSearchResult {
                chunk: chunk.clone(),
                score: cosine_similarity(query_embedding, vector),
            })
            .collect::<Vec<_>>();

        Ok(top_k(results, k))
    }

    async fn max_marginal_relevance_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<ChunkSearchResult>, VectorStoreError> {
        let entries = self.entries.read().await;
        let Some((_, first)) = entries.first() else {
            return Ok(Vec::new());
        };
        check_dimension(first.len(), query_embedding.len())?;

        let vectors: Vec<Vec<f32>> = entries.iter().map(|(_, v)| v.clone()).collect();
        let nearest: Vec<(usize, f32)> = rank_descending_by_cosine(query_embedding, &vectors)
            .into_iter()
            .take(fetch_k.max(k))
            .collect();

        let candidates: Vec<Vec<f32>> = nearest.iter().map(|(idx, _)| vectors[*idx].clone()).collect();
        let selected = maximal_marginal_relevance(query_embedding, &candidates, k, lambda_mult);

        Ok(selected
            .into_iter()
            .map(|pos| {
                let (entry_idx, score) = nearest[pos];
                ChunkSearchResult {
                    chunk: entries[entry_idx].0.clone(),
                    score,
                }
            })
            .collect())
    }

    async fn count(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn snapshot(&self) -> Vec<(Chunk, Vec<f32>)> {
        self.entries.read().await.clone()
    }
}

fn top_k(mut results: Vec<ChunkSearchResult>, k: usize) -> Vec<ChunkSearchResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            source: format!("src-{}", id),
            row: 0,
            chunk_index: 0,
        }
    }

    async fn seeded() -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        store
            .insert_batch(vec![
                (chunk("a", "flu fever"), vec![1.0, 0.0, 0.0]),
                (chunk("b", "flu cough"), vec![0.99, 0.1, 0.0]),
                (chunk("c", "gout"), vec![0.0, 1.0, 0.0]),
                (chunk("d", "flu chills"), vec![0.7, 0.0, 0.7]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn similarity_search_orders_by_score() {
        let store = seeded().await;
        let results = store.similarity_search(&[1.0, 0.0, 0.0], 2).await.unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn mmr_search_skips_near_duplicates() {
        let store = seeded().await;
        let results = store
            .max_marginal_relevance_search(&[1.0, 0.0, 0.3], 2, 20, 0.5)
            .await
            .unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = seeded().await;
        let err = store
            .insert_batch(vec![(chunk("e", "x"), vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { expected: 3, actual: 1 }));

        let err = store.similarity_search(&[1.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new();
        assert!(store.similarity_search(&[1.0], 2).await.unwrap().is_empty());
        assert!(store
            .max_marginal_relevance_search(&[1.0], 2, 20, 0.5)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.count().await, 0);
    }
}
