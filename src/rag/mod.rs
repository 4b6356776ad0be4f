//! Retrieval over the disease catalog.
//!
//! - `splitter`: recursive character splitting into overlapping chunks
//! - `store`: the `VectorStore` trait and its in-memory implementation
//! - `mmr`: maximal marginal relevance re-ranking
//! - `index`: builds (and caches) the index from catalog records
//! - `retriever`: embeds a query and searches the store

pub mod index;
pub mod mmr;
pub mod retriever;
pub mod splitter;
pub mod store;

pub use index::{IndexBuilder, IndexStats};
pub use retriever::{Retriever, RetrieverConfig};
pub use splitter::{Chunk, SplitterError, TextSplitter};
pub use store::{ChunkSearchResult, InMemoryVectorStore, VectorStore, VectorStoreError};
