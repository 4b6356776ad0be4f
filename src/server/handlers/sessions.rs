use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::chat::message_payload;
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: Option<String>,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.history.list_sessions().await?;
    Ok(Json(json!({"sessions": sessions})))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.and_then(|Json(body)| body.title);
    let session = state.history.create_session(title).await?;
    Ok(Json(json!({"session": session})))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.history.require_session(&session_id).await?;
    let messages = session_messages(&state, &session_id, state.config.history.default_limit).await?;
    Ok(Json(json!({"session": session, "messages": messages})))
}

pub async fn get_session_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    state.history.require_session(&session_id).await?;
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(state.config.history.default_limit);

    let messages = session_messages(&state, &session_id, limit).await?;
    Ok(Json(json!({"messages": messages})))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.history.delete_session(&session_id).await? {
        return Err(ApiError::NotFound(format!(
            "Session {} not found",
            session_id
        )));
    }
    Ok(Json(json!({"success": true})))
}

pub async fn session_messages(
    state: &AppState,
    session_id: &str,
    limit: i64,
) -> Result<Vec<Value>, ApiError> {
    let messages = state.history.get_history(session_id, limit).await?;
    Ok(messages
        .iter()
        .map(|msg| message_payload(msg.role, &msg.content, &msg.extra, &msg.created_at))
        .collect())
}
