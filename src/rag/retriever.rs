use std::sync::Arc;

use super::store::{ChunkSearchResult, VectorStore, VectorStoreError};
use crate::core::config::defaults::{RetrievalSection, SearchType};
use crate::llm::Embedder;

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub search_type: SearchType,
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self::from(&RetrievalSection::default())
    }
}

impl From<&RetrievalSection> for RetrieverConfig {
    fn from(section: &RetrievalSection) -> Self {
        Self {
            search_type: section.search_type,
            k: section.k,
            fetch_k: section.fetch_k,
            lambda_mult: section.lambda_mult,
        }
    }
}

/// Embeds a query and looks it up in the vector store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, config: RetrieverConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<ChunkSearchResult>, VectorStoreError> {
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = vectors.pop().ok_or(VectorStoreError::CountMismatch {
            chunks: 1,
            vectors: 0,
        })?;

        let results = match self.config.search_type {
            SearchType::Similarity => {
                self.store
                    .similarity_search(&query_embedding, self.config.k)
                    .await?
            }
            SearchType::Mmr => {
                self.store
                    .max_marginal_relevance_search(
                        &query_embedding,
                        self.config.k,
                        self.config.fetch_k,
                        self.config.lambda_mult,
                    )
                    .await?
            }
        };

        tracing::debug!(
            "Retrieved {} chunks for query ({} chars)",
            results.len(),
            query.len()
        );
        Ok(results)
    }
}
