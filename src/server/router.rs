use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::AppConfig;
use crate::server::handlers::{chat, health, page, sessions};
use crate::server::ws::handler::ws_handler;
use crate::state::AppState;

/// Creates the application router: the chat page, health and info,
/// session and message endpoints, and the websocket, wrapped in CORS
/// and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config);
    Router::new()
        .route("/", get(page::index))
        .route("/health", get(health::health))
        .route("/api/info", get(page::info))
        .route(
            "/api/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/api/sessions/:session_id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            get(sessions::get_session_messages).post(chat::send_message),
        )
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let allow_origin = AllowOrigin::list(
        allowed_origins(config)
            .into_iter()
            .filter_map(|origin| HeaderValue::from_str(&origin).ok())
            .collect::<Vec<_>>(),
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

/// Configured origins, or the local ones for the configured port.
pub fn allowed_origins(config: &AppConfig) -> Vec<String> {
    let origins = config
        .server
        .cors_allowed_origins
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.trim_end_matches('/').to_string())
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins(config.server.port);
    }

    origins
}

fn default_local_origins(port: u16) -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        format!("http://localhost:{}", port),
        "http://127.0.0.1".to_string(),
        format!("http://127.0.0.1:{}", port),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_origins_follow_configured_port() {
        let mut config = AppConfig::default();
        config.server.port = 9000;
        let origins = allowed_origins(&config);
        assert!(origins.contains(&"http://localhost:9000".to_string()));
        assert!(origins.contains(&"http://127.0.0.1".to_string()));
    }

    #[test]
    fn configured_origins_replace_defaults() {
        let mut config = AppConfig::default();
        config.server.cors_allowed_origins =
            vec!["https://clinic.example/".to_string(), "  ".to_string()];
        assert_eq!(allowed_origins(&config), vec!["https://clinic.example"]);
    }
}
