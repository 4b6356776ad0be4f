use thiserror::Error;

use crate::catalog::CatalogError;
use crate::core::config::service::ConfigError;
use crate::llm::LlmError;
use crate::rag::{SplitterError, VectorStoreError};

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load disease catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid splitter settings: {0}")]
    Splitter(#[from] SplitterError),

    #[error("Failed to build similarity index: {0}")]
    Index(#[from] VectorStoreError),

    #[error("Failed to initialize history store: {0}")]
    History(#[source] anyhow::Error),

    #[error("Failed to initialize LLM client: {0}")]
    Llm(#[from] LlmError),
}
