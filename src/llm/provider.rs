use async_trait::async_trait;

use super::types::{ChatRequest, LlmError};

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs and health output.
    fn model_name(&self) -> &str;

    /// Non-streaming chat completion; returns the assistant text.
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
