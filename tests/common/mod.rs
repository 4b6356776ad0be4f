#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use disease_explainer::catalog::{parse_catalog, CatalogOptions};
use disease_explainer::core::config::{AppConfig, AppPaths};
use disease_explainer::llm::{ChatModel, ChatRequest, Embedder, LlmError, Role};
use disease_explainer::state::AppState;

pub const CATALOG: &str = "\
Influenza;\"Influenza is a viral infection; it causes fever and aches.\";https://msd.example/flu
Gout;Gout is arthritis caused by urate crystals in a joint.;https://msd.example/gout
";

pub const CONDENSED_QUESTION: &str = "What are the symptoms of gout?";

/// Rewrites every follow-up into `CONDENSED_QUESTION` and answers by
/// echoing the question.
#[derive(Default)]
pub struct FakeChat {
    pub calls: AtomicUsize,
    pub condense_calls: AtomicUsize,
    pub fail: bool,
}

impl FakeChat {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn condense_calls(&self) -> usize {
        self.condense_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    fn model_name(&self) -> &str {
        "fake-chat"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Let a concurrent turn run while this one is mid-chain.
        tokio::task::yield_now().await;
        if self.fail {
            return Err(LlmError::Status {
                status: 503,
                body: "overloaded".to_string(),
            });
        }

        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if request.messages.len() == 1 && last.contains("Standalone question:") {
            self.condense_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(CONDENSED_QUESTION.to_string());
        }

        assert_eq!(request.messages[0].role, Role::System);
        Ok(format!("Answer to: {}", last))
    }
}

/// Two axes: mentions of flu and mentions of gout.
pub struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedding"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(inputs
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                vec![
                    if text.contains("flu") { 1.0 } else { 0.1 },
                    if text.contains("gout") { 1.0 } else { 0.1 },
                ]
            })
            .collect())
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub chat: Arc<FakeChat>,
    _dir: TempDir,
}

pub async fn test_app_with(chat: FakeChat) -> TestApp {
    let dir = TempDir::new().unwrap();
    let paths = Arc::new(AppPaths::from_dirs(
        dir.path().to_path_buf(),
        dir.path().to_path_buf(),
    ));

    let mut config = AppConfig::default();
    config.retrieval.cache_enabled = false;

    let records = parse_catalog(CATALOG.as_bytes(), CatalogOptions::default()).unwrap();
    let chat = Arc::new(chat);
    let state = AppState::build(paths, config, chat.clone(), Arc::new(FakeEmbedder), &records)
        .await
        .unwrap();

    TestApp {
        state,
        chat,
        _dir: dir,
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(FakeChat::default()).await
}
