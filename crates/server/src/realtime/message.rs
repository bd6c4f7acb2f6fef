//! Frames exchanged over `/api/ws`.
//!
//! Frames are adjacently tagged: `{"type": "...", "data": {...}}`. The
//! payloads inside `data` keep the camelCase field names browsers already
//! send for collaborative editing and card moves.

use serde::{Deserialize, Serialize};
use services::services::{
    broadcast_relay::RelayMessage,
    events::{CardMoveMessage, CollaborativeEditMessage},
};

/// Messages sent from a browser to the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving a topic, `post/{postId}` or `kanban/{boardId}`
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    /// Collaborative editing traffic, relayed to the post topic
    PostEdit(CollaborativeEditMessage),
    /// Card placement notice, relayed to the board topic
    CardMove(CardMoveMessage),
}

/// Messages sent from the server to a browser.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { topic: String },
    Unsubscribed { topic: String },
    /// A payload published on a topic this connection subscribed to
    Event(RelayMessage),
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
