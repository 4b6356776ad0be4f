use std::sync::Arc;

use crate::catalog::{load_catalog, CatalogOptions, DiseaseRecord};
use crate::chain::{ChainConfig, RetrievalChain};
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::history::HistoryStore;
use crate::llm::{ChatModel, Embedder, OpenAiProvider};
use crate::memory::TokenBufferMemory;
use crate::rag::{
    InMemoryVectorStore, IndexBuilder, IndexStats, Retriever, RetrieverConfig, TextSplitter,
    VectorStore,
};

pub mod error;
pub mod turns;

use error::InitializationError;
use turns::TurnLocks;

/// Shared state behind every route: config, the built index, the chain
/// and the session store.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub history: HistoryStore,
    pub chain: RetrievalChain,
    pub index: IndexStats,
    pub turns: TurnLocks,
}

impl AppState {
    /// Loads config and catalog, builds the index with the OpenAI
    /// embeddings client and opens the history store.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone()).load_config()?;

        let provider = Arc::new(OpenAiProvider::from_config(&config.openai)?);
        tracing::info!(
            "Using chat model {} and embedding model {} at {}",
            config.openai.chat_model,
            config.openai.embedding_model,
            config.openai.base_url
        );

        let catalog_path = paths.resolve(&config.catalog.path);
        let options = CatalogOptions::new(config.catalog.delimiter, config.catalog.quote);
        let records = load_catalog(&catalog_path, options)?;

        Self::build(paths, config, provider.clone(), provider, &records).await
    }

    /// Assembles the state from already loaded parts. Models are injected
    /// so callers can substitute their own implementations.
    pub async fn build(
        paths: Arc<AppPaths>,
        config: AppConfig,
        chat_model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        records: &[DiseaseRecord],
    ) -> Result<Arc<Self>, InitializationError> {
        let splitter = TextSplitter::new(config.splitter.chunk_size, config.splitter.chunk_overlap)?;

        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let cache_path = config
            .retrieval
            .cache_enabled
            .then(|| paths.index_cache_path.clone());
        let index = IndexBuilder::new(splitter, embedder.clone())
            .with_batch_size(config.retrieval.embed_batch_size)
            .with_cache(cache_path)
            .build(store.as_ref(), records)
            .await?;
        tracing::info!(
            "Index ready: {} chunks from {} records (cached: {})",
            index.chunks,
            index.records,
            index.from_cache
        );

        let history = if config.history.persist {
            HistoryStore::new(paths.db_path.clone()).await
        } else {
            HistoryStore::in_memory().await
        }
        .map_err(|e| InitializationError::History(e.into()))?;

        let retriever = Retriever::new(
            store,
            embedder,
            RetrieverConfig::from(&config.retrieval),
        );
        let memory = TokenBufferMemory::new(config.memory.max_token_limit);
        let chain = RetrievalChain::new(chat_model, retriever, memory, ChainConfig::from(&config));

        Ok(Arc::new(AppState {
            paths,
            config: Arc::new(config),
            history,
            chain,
            index,
            turns: TurnLocks::default(),
        }))
    }
}
