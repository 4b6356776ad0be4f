use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde_json::json;

use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../assets/index.html");

pub const INPUT_PLACEHOLDER: &str = "Example: What is the common flu?";

pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = &state.config;
    Json(json!({
        "name": config.app.name,
        "description": config.app.description,
        "placeholder": INPUT_PLACEHOLDER,
        "chat_model": config.openai.chat_model,
        "embedding_model": config.openai.embedding_model,
        "index": state.index,
    }))
}
