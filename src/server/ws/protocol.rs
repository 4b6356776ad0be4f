use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::server::handlers::chat::TurnResponse;

#[derive(Debug, Deserialize, Default)]
pub struct WsIncomingMessage {
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoingMessage {
    SessionChanged {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Answer {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(flatten)]
        turn: TurnResponse,
    },
    History {
        #[serde(rename = "sessionId")]
        session_id: String,
        messages: Vec<Value>,
    },
    Error {
        message: String,
    },
}
