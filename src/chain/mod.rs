//! Conversational retrieval: condense, retrieve, prompt, answer.

pub mod conversational;
pub mod prompt;

pub use conversational::{ChainAnswer, ChainConfig, ChainError, RetrievalChain};
pub use prompt::{render_template, PromptError};
