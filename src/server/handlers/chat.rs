use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chain::ChainAnswer;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, Role};
use crate::rag::ChunkSearchResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub id: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

impl From<&ChunkSearchResult> for SourceRef {
    fn from(result: &ChunkSearchResult) -> Self {
        Self {
            id: result.chunk.id.clone(),
            source: result.chunk.source.clone(),
            text: result.chunk.text.clone(),
            score: result.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub answer: String,
    pub display: String,
    pub sources: Vec<SourceRef>,
    pub standalone_question: String,
}

impl From<&ChainAnswer> for TurnResponse {
    fn from(answer: &ChainAnswer) -> Self {
        Self {
            answer: answer.answer.clone(),
            display: answer.display_text(),
            sources: answer.sources.iter().map(SourceRef::from).collect(),
            standalone_question: answer.standalone_question.clone(),
        }
    }
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let turn = run_turn(&state, &session_id, &payload.message).await?;
    Ok(Json(turn))
}

/// One chat turn against a session: load its transcript, run the chain,
/// then persist the question and the answer.
pub async fn run_turn(
    state: &AppState,
    session_id: &str,
    question: &str,
) -> Result<TurnResponse, ApiError> {
    state.history.require_session(session_id).await?;
    let _turn = state.turns.acquire(session_id).await;

    let transcript: Vec<ChatMessage> = state
        .history
        .get_history(session_id, state.config.history.default_limit)
        .await?
        .iter()
        .map(|msg| msg.to_chat_message())
        .collect();

    let answer = state.chain.ask(&transcript, question).await?;
    let turn = TurnResponse::from(&answer);

    state
        .history
        .add_message(session_id, Role::User, question.trim(), &json!({}))
        .await?;
    state
        .history
        .add_message(
            session_id,
            Role::Assistant,
            &turn.answer,
            &json!({
                "sources": turn.sources,
                "standalone_question": turn.standalone_question,
            }),
        )
        .await?;

    Ok(turn)
}

/// Transcript entry as the page renders it; assistant turns carry their
/// display text with the source appended.
pub fn message_payload(role: Role, content: &str, extra: &Value, created_at: &str) -> Value {
    let source = extra
        .get("sources")
        .and_then(|v| v.as_array())
        .and_then(|sources| sources.first())
        .and_then(|first| first.get("source"))
        .and_then(|v| v.as_str());
    let display = match role {
        Role::Assistant => crate::chain::conversational::display_text(content, source),
        _ => content.to_string(),
    };

    json!({
        "role": role.as_str(),
        "content": content,
        "display": display,
        "sources": extra.get("sources").cloned().unwrap_or_else(|| json!([])),
        "created_at": created_at,
    })
}
