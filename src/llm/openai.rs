use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{ChatModel, Embedder};
use super::types::{ChatRequest, LlmError};
use crate::core::config::defaults::OpenAiSection;

/// Client for OpenAI-compatible `/v1/chat/completions` and `/v1/embeddings`.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            client,
        })
    }

    pub fn from_config(config: &OpenAiSection) -> Result<Self, LlmError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.chat_model.clone(),
            config.embedding_model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/v1/{}", self.base_url, path)
        }
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, LlmError> {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        } else if self.base_url.contains("api.openai.com") {
            return Err(LlmError::MissingApiKey);
        }

        let res = request
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        res.json::<Value>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

fn parse_chat_response(payload: Value) -> Result<String, LlmError> {
    let response: ChatCompletionResponse =
        serde_json::from_value(payload).map_err(|e| LlmError::Decode(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::Decode("response has no message content".to_string()))
}

fn parse_embedding_response(payload: Value, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let response: EmbeddingResponse =
        serde_json::from_value(payload).map_err(|e| LlmError::Decode(e.to_string()))?;
    if response.data.len() != expected {
        return Err(LlmError::Decode(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (pos, item) in response.data.into_iter().enumerate() {
        let index = item.index.unwrap_or(pos);
        let slot = slots.get_mut(index).ok_or_else(|| {
            LlmError::Decode(format!(
                "embedding index {} out of range for {} inputs",
                index, expected
            ))
        })?;
        if slot.is_some() {
            return Err(LlmError::Decode(format!(
                "duplicate embedding index {}",
                index
            )));
        }
        *slot = Some(item.embedding);
    }
    // Equal counts with no duplicates and no out-of-range index fill every slot.
    Ok(slots.into_iter().flatten().collect())
}

#[async_trait]
impl ChatModel for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        let url = self.endpoint("chat/completions");

        let mut body = json!({
            "model": self.chat_model,
            "messages": request.messages,
            "stream": false,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
        }

        tracing::debug!("Chat request to {} ({} messages)", url, request.messages.len());
        let payload = self.post_json(&url, &body).await?;
        parse_chat_response(payload)
    }
}

#[async_trait]
impl Embedder for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint("embeddings");
        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let payload = self.post_json(&url, &body).await?;
        parse_embedding_response(payload, inputs.len())
    }
}
