use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::chain::ChainError;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::EmptyQuestion | ChainError::QuestionTooLong { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            ChainError::Llm(inner) => ApiError::Upstream(inner.to_string()),
            ChainError::Retrieval(inner) => match inner {
                crate::rag::VectorStoreError::Embedding(llm) => ApiError::Upstream(llm.to_string()),
                other => ApiError::Internal(other.to_string()),
            },
            ChainError::Prompt(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_errors_map_to_http_statuses() {
        let bad: ApiError = ChainError::EmptyQuestion.into();
        assert!(matches!(bad, ApiError::BadRequest(_)));

        let upstream: ApiError = ChainError::Llm(LlmError::Transport("timed out".into())).into();
        assert!(matches!(upstream, ApiError::Upstream(_)));
        assert_eq!(
            upstream.into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
