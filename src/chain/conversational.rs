use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::prompt::{answer_messages, condense_messages, PromptError};
use crate::core::config::AppConfig;
use crate::llm::{estimate_tokens, ChatMessage, ChatModel, ChatRequest, LlmError};
use crate::memory::{format_history, TokenBufferMemory};
use crate::rag::{ChunkSearchResult, Retriever, VectorStoreError};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("question is {len} characters, the limit is {max}")]
    QuestionTooLong { len: usize, max: usize },
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("prompt error: {0}")]
    Prompt(#[from] PromptError),
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Token budget for the retrieved documents stuffed into the prompt.
    pub max_tokens_limit: usize,
    pub max_question_chars: usize,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_tokens_limit: 1800,
            max_question_chars: 2000,
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

impl From<&AppConfig> for ChainConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_tokens_limit: config.chain.max_tokens_limit,
            max_question_chars: config.chain.max_question_chars,
            temperature: config.openai.temperature,
            max_tokens: config.openai.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainAnswer {
    pub answer: String,
    pub standalone_question: String,
    pub sources: Vec<ChunkSearchResult>,
}

impl ChainAnswer {
    /// The answer followed by the top source, as shown in the chat log.
    pub fn display_text(&self) -> String {
        display_text(&self.answer, self.sources.first().map(|s| s.chunk.source.as_str()))
    }
}

pub fn display_text(answer: &str, source: Option<&str>) -> String {
    match source.filter(|s| !s.is_empty()) {
        Some(source) => format!("{} Source: {}", answer, source),
        None => answer.to_string(),
    }
}

#[derive(Clone)]
pub struct RetrievalChain {
    chat_model: Arc<dyn ChatModel>,
    retriever: Retriever,
    memory: TokenBufferMemory,
    config: ChainConfig,
}

impl RetrievalChain {
    pub fn new(
        chat_model: Arc<dyn ChatModel>,
        retriever: Retriever,
        memory: TokenBufferMemory,
        config: ChainConfig,
    ) -> Self {
        Self {
            chat_model,
            retriever,
            memory,
            config,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn chat_model(&self) -> &Arc<dyn ChatModel> {
        &self.chat_model
    }

    /// Runs one turn. `history` is the session transcript before `question`.
    pub async fn ask(&self, history: &[ChatMessage], question: &str) -> Result<ChainAnswer, ChainError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChainError::EmptyQuestion);
        }
        let len = question.chars().count();
        if len > self.config.max_question_chars {
            return Err(ChainError::QuestionTooLong {
                len,
                max: self.config.max_question_chars,
            });
        }

        let buffer = self.memory.window(history);
        let chat_history = format_history(&buffer);

        let standalone_question = if buffer.is_empty() {
            question.to_string()
        } else {
            self.condense(&chat_history, question).await?
        };

        let retrieved = self.retriever.retrieve(&standalone_question).await?;
        let sources = reduce_tokens_below_limit(retrieved, self.config.max_tokens_limit);
        let context = sources
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = answer_messages(&context, &chat_history, &standalone_question)?;
        let request = ChatRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        let answer = self.chat_model.chat(request).await?.trim().to_string();

        tracing::info!(
            "Answered with {} context chunks (model {})",
            sources.len(),
            self.chat_model.model_name()
        );

        Ok(ChainAnswer {
            answer,
            standalone_question,
            sources,
        })
    }

    async fn condense(&self, chat_history: &str, question: &str) -> Result<String, ChainError> {
        let request = ChatRequest::new(condense_messages(chat_history, question)?)
            .with_temperature(self.config.temperature);
        let rewritten = self.chat_model.chat(request).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Ok(question.to_string());
        }
        tracing::debug!("Condensed follow-up into: {}", rewritten);
        Ok(rewritten.to_string())
    }
}

/// Drops trailing documents until their summed token estimate fits `limit`.
pub fn reduce_tokens_below_limit(
    mut docs: Vec<ChunkSearchResult>,
    limit: usize,
) -> Vec<ChunkSearchResult> {
    let mut total: usize = docs.iter().map(|d| estimate_tokens(&d.chunk.text)).sum();
    while total > limit {
        let Some(last) = docs.pop() else {
            break;
        };
        total -= estimate_tokens(&last.chunk.text);
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Embedder, Role};
    use crate::rag::{Chunk, InMemoryVectorStore, RetrieverConfig, VectorStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedChat {
        replies: Mutex<Vec<String>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedChat {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LlmError::Transport("no scripted reply".to_string()))
        }
    }

    /// Maps text onto two axes: flu-ness and gout-ness.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(inputs
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("flu") { 1.0 } else { 0.1 },
                        if t.contains("gout") { 1.0 } else { 0.1 },
                    ]
                })
                .collect())
        }
    }

    fn chunk(id: &str, text: &str, source: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            source: source.to_string(),
            row: 0,
            chunk_index: 0,
        }
    }

    async fn chain_with(chat: Arc<ScriptedChat>) -> RetrievalChain {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .insert_batch(vec![
                (chunk("0-0", "name: Influenza flu", "https://msd/flu"), vec![1.0, 0.1]),
                (chunk("1-0", "name: Gout", "https://msd/gout"), vec![0.1, 1.0]),
            ])
            .await
            .unwrap();
        let retriever = Retriever::new(
            store,
            Arc::new(KeywordEmbedder),
            RetrieverConfig {
                k: 1,
                ..RetrieverConfig::default()
            },
        );
        RetrievalChain::new(chat, retriever, TokenBufferMemory::default(), ChainConfig::default())
    }

    #[tokio::test]
    async fn first_turn_skips_condensing() {
        let chat = ScriptedChat::new(&["Influenza is a viral infection."]);
        let chain = chain_with(chat.clone()).await;

        let answer = chain.ask(&[], "What is the flu?").await.unwrap();

        assert_eq!(answer.answer, "Influenza is a viral infection.");
        assert_eq!(answer.standalone_question, "What is the flu?");
        assert_eq!(answer.sources[0].chunk.source, "https://msd/flu");
        assert_eq!(
            answer.display_text(),
            "Influenza is a viral infection. Source: https://msd/flu"
        );

        let requests = chat.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, Some(0.0));
        assert!(requests[0].messages[0].content.contains("name: Influenza flu"));
        assert_eq!(requests[0].messages[1].content, "What is the flu?");
    }

    #[tokio::test]
    async fn follow_up_is_condensed_and_retrieved_with_the_rewrite() {
        let chat = ScriptedChat::new(&["What are the symptoms of gout?", "Painful joints."]);
        let chain = chain_with(chat.clone()).await;
        let history = vec![
            ChatMessage::user("What is gout?"),
            ChatMessage::assistant("Urate crystal deposition."),
        ];

        let answer = chain.ask(&history, "And its symptoms?").await.unwrap();

        assert_eq!(answer.standalone_question, "What are the symptoms of gout?");
        assert_eq!(answer.sources[0].chunk.source, "https://msd/gout");

        let requests = chat.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].messages[0]
            .content
            .contains("Follow Up Input: And its symptoms?"));
        let system = &requests[1].messages[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("Human: What is gout?"));
        assert_eq!(requests[1].messages[1].content, "What are the symptoms of gout?");
    }

    #[tokio::test]
    async fn empty_and_oversized_questions_are_rejected() {
        let chain = chain_with(ScriptedChat::new(&[])).await;
        assert!(matches!(chain.ask(&[], "   ").await, Err(ChainError::EmptyQuestion)));
        assert!(matches!(
            chain.ask(&[], &"x".repeat(2001)).await,
            Err(ChainError::QuestionTooLong { len: 2001, max: 2000 })
        ));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let chain = chain_with(ScriptedChat::new(&[])).await;
        assert!(matches!(
            chain.ask(&[], "What is the flu?").await,
            Err(ChainError::Llm(_))
        ));
    }

    #[test]
    fn reduce_drops_trailing_documents() {
        let docs = vec![
            ChunkSearchResult { chunk: chunk("a", &"a".repeat(40), "s"), score: 0.9 },
            ChunkSearchResult { chunk: chunk("b", &"b".repeat(40), "s"), score: 0.8 },
        ];
        assert_eq!(reduce_tokens_below_limit(docs.clone(), 20).len(), 2);
        assert_eq!(reduce_tokens_below_limit(docs.clone(), 15).len(), 1);
        assert!(reduce_tokens_below_limit(docs, 5).is_empty());
    }

    #[test]
    fn display_text_omits_missing_source() {
        assert_eq!(display_text("No info.", None), "No info.");
        assert_eq!(display_text("No info.", Some("")), "No info.");
    }
}
