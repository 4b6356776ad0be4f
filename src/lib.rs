//! Disease explainer: a retrieval-augmented chat assistant over a
//! catalog of disease descriptions.

pub mod catalog;
pub mod chain;
pub mod core;
pub mod history;
pub mod llm;
pub mod memory;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;
