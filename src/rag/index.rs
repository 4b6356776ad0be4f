//! Builds the similarity index from the catalog.
//!
//! Records are split, embedded in batches and inserted into the store.
//! Finished indexes are cached on disk keyed by a fingerprint of the
//! records, splitter settings and embedding model, so restarts do not
//! re-embed an unchanged catalog.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::splitter::{Chunk, TextSplitter};
use super::store::{VectorStore, VectorStoreError};
use crate::catalog::{to_documents, DiseaseRecord};
use crate::llm::Embedder;

const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub records: usize,
    pub chunks: usize,
    pub from_cache: bool,
}

#[derive(Serialize, Deserialize)]
struct IndexCache {
    version: u32,
    fingerprint: String,
    embedding_model: String,
    entries: Vec<CachedEntry>,
}

#[derive(Serialize, Deserialize)]
struct CachedEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

pub struct IndexBuilder {
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    cache_path: Option<PathBuf>,
}

impl IndexBuilder {
    pub fn new(splitter: TextSplitter, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            splitter,
            embedder,
            batch_size: 64,
            cache_path: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cache(mut self, path: Option<PathBuf>) -> Self {
        self.cache_path = path;
        self
    }

    /// Fills `store` from `records`, replacing whatever it held.
    pub async fn build(
        &self,
        store: &dyn VectorStore,
        records: &[DiseaseRecord],
    ) -> Result<IndexStats, VectorStoreError> {
        let fingerprint = self.fingerprint(records);
        store.clear().await;

        if let Some(entries) = self.load_cache(&fingerprint) {
            let chunks = entries.len();
            store.insert_batch(entries).await?;
            tracing::info!("Loaded {} indexed chunks from cache", chunks);
            return Ok(IndexStats {
                records: records.len(),
                chunks,
                from_cache: true,
            });
        }

        let chunks = self.splitter.split_documents(&to_documents(records));
        tracing::info!(
            "Embedding {} chunks from {} records with {}",
            chunks.len(),
            records.len(),
            self.embedder.model_name()
        );

        let mut indexed = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(VectorStoreError::CountMismatch {
                    chunks: batch.len(),
                    vectors: vectors.len(),
                });
            }
            indexed.extend(batch.iter().cloned().zip(vectors));
        }

        let count = indexed.len();
        store.insert_batch(indexed).await?;

        if self.cache_path.is_some() {
            let entries = store.snapshot().await;
            if let Err(err) = self.save_cache(&fingerprint, &entries) {
                tracing::warn!("Failed to write index cache: {}", err);
            }
        }

        Ok(IndexStats {
            records: records.len(),
            chunks: count,
            from_cache: false,
        })
    }

    fn fingerprint(&self, records: &[DiseaseRecord]) -> String {
        let mut hasher = Sha256::new();
        for record in records {
            hasher.update(record.row.to_le_bytes());
            for field in [&record.name, &record.document, &record.source] {
                hasher.update(field.as_bytes());
                hasher.update([0u8]);
            }
        }
        hasher.update(self.splitter.chunk_size().to_le_bytes());
        hasher.update(self.splitter.chunk_overlap().to_le_bytes());
        hasher.update(self.embedder.model_name().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn load_cache(&self, fingerprint: &str) -> Option<Vec<(Chunk, Vec<f32>)>> {
        let path = self.cache_path.as_ref()?;
        if !path.exists() {
            return None;
        }

        let cache: IndexCache = match fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
        {
            Ok(cache) => cache,
            Err(err) => {
                tracing::warn!("Ignoring unreadable index cache {}: {}", path.display(), err);
                return None;
            }
        };

        if cache.version != CACHE_VERSION || cache.fingerprint != fingerprint {
            tracing::info!("Index cache is stale, rebuilding");
            return None;
        }

        Some(
            cache
                .entries
                .into_iter()
                .map(|entry| (entry.chunk, entry.embedding))
                .collect(),
        )
    }

    fn save_cache(&self, fingerprint: &str, entries: &[(Chunk, Vec<f32>)]) -> Result<(), VectorStoreError> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };

        let cache = IndexCache {
            version: CACHE_VERSION,
            fingerprint: fingerprint.to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            entries: entries
                .iter()
                .map(|(chunk, embedding)| CachedEntry {
                    chunk: chunk.clone(),
                    embedding: embedding.clone(),
                })
                .collect(),
        };

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let bytes = serde_json::to_vec(&cache).map_err(|e| VectorStoreError::Cache(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| VectorStoreError::Cache(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| VectorStoreError::Cache(e.to_string()))?;
        Ok(())
    }
}
