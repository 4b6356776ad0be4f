use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use super::protocol::{WsIncomingMessage, WsOutgoingMessage};
use crate::core::errors::ApiError;
use crate::server::handlers::chat::run_turn;
use crate::server::handlers::sessions::session_messages;
use crate::server::router::allowed_origins;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let origin_ok = validate_origin(&headers, &state);
    ws.on_upgrade(move |socket| handle_socket(socket, state, origin_ok))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, origin_ok: bool) {
    let (mut sender, mut receiver) = socket.split();

    if !origin_ok {
        let _ = sender
            .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                code: 4003,
                reason: "Forbidden: Invalid Origin".into(),
            })))
            .await;
        return;
    }

    let mut current_session_id = match state.history.create_session(None).await {
        Ok(session) => session.id,
        Err(err) => {
            tracing::error!("Failed to create session for websocket: {}", err);
            let _ = send_error(&mut sender, &err).await;
            return;
        }
    };
    if send_json(
        &mut sender,
        &WsOutgoingMessage::SessionChanged {
            session_id: current_session_id.clone(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let result = match serde_json::from_str::<WsIncomingMessage>(&text) {
            Ok(incoming) => handle_message(&mut sender, &state, &mut current_session_id, incoming).await,
            Err(err) => Err(ApiError::BadRequest(format!("Invalid message: {}", err))),
        };

        if let Err(err) = result {
            tracing::warn!("Websocket message failed: {}", err);
            if send_error(&mut sender, &err).await.is_err() {
                break;
            }
        }
    }

    tracing::debug!("Websocket for session {} closed", current_session_id);
}

async fn handle_message(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
    current_session_id: &mut String,
    data: WsIncomingMessage,
) -> Result<(), ApiError> {
    match data.msg_type.as_deref().unwrap_or("message") {
        "set_session" => {
            let session_id = data
                .session_id
                .ok_or_else(|| ApiError::BadRequest("sessionId is required".to_string()))?;
            state.history.require_session(&session_id).await?;
            *current_session_id = session_id;
            send_json(
                sender,
                &WsOutgoingMessage::SessionChanged {
                    session_id: current_session_id.clone(),
                },
            )
            .await?;
            send_history(sender, state, current_session_id).await
        }
        "history" => send_history(sender, state, current_session_id).await,
        "message" => {
            let question = data.message.unwrap_or_default();
            let turn = run_turn(state, current_session_id, &question).await?;
            send_json(
                sender,
                &WsOutgoingMessage::Answer {
                    session_id: current_session_id.clone(),
                    turn,
                },
            )
            .await
        }
        other => Err(ApiError::BadRequest(format!(
            "Unknown message type: {}",
            other
        ))),
    }
}

async fn send_history(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
    session_id: &str,
) -> Result<(), ApiError> {
    let messages = session_messages(state, session_id, state.config.history.default_limit).await?;
    send_json(
        sender,
        &WsOutgoingMessage::History {
            session_id: session_id.to_string(),
            messages,
        },
    )
    .await
}

async fn send_error(
    sender: &mut SplitSink<WebSocket, Message>,
    err: &ApiError,
) -> Result<(), ApiError> {
    let message = match err {
        ApiError::BadRequest(msg)
        | ApiError::NotFound(msg)
        | ApiError::Upstream(msg)
        | ApiError::Internal(msg) => msg.clone(),
    };
    send_json(sender, &WsOutgoingMessage::Error { message }).await
}

pub async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &WsOutgoingMessage,
) -> Result<(), ApiError> {
    let text = serde_json::to_string(payload).map_err(ApiError::internal)?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(ApiError::internal)
}

/// Browsers always send `Origin`; it must be a configured origin or the
/// page's own host. Clients without one are let through.
fn validate_origin(headers: &HeaderMap, state: &AppState) -> bool {
    let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return true;
    };

    if let Some(host) = headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        let without_scheme = origin
            .strip_prefix("http://")
            .or_else(|| origin.strip_prefix("https://"))
            .unwrap_or(origin);
        if without_scheme == host {
            return true;
        }
    }

    allowed_origins(&state.config)
        .iter()
        .any(|allowed| origin == allowed || origin.starts_with(&format!("{}/", allowed)))
}
