//! Payloads published on relay topics.

use db::models::{card::{Card, CardStatus}, checklist_item::ChecklistItem};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditMessageType {
    Join,
    Leave,
    ContentChange,
    CursorMove,
    Save,
}

/// Collaborative editing traffic on `post/{postId}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CollaborativeEditMessage {
    pub post_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "type")]
    pub kind: EditMessageType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub cursor_position: Option<i64>,
    /// Milliseconds since the epoch, stamped by the relay.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Card placement notice on `kanban/{boardId}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CardMoveMessage {
    pub card_id: Uuid,
    pub board_id: Uuid,
    pub status: CardStatus,
    pub position: i64,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Everything else that changes a board, so open board views can refresh.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoardEvent {
    CardCreated { card: Card },
    CardUpdated { card: Card },
    #[serde(rename_all = "camelCase")]
    CardDeleted {
        card_id: Uuid,
        status: CardStatus,
        position: i64,
    },
    #[serde(rename_all = "camelCase")]
    ChecklistChanged {
        card_id: Uuid,
        items: Vec<ChecklistItem>,
    },
    #[serde(rename_all = "camelCase")]
    CommentAdded { card_id: Uuid, comment_count: i64 },
    #[serde(rename_all = "camelCase")]
    BoardDeleted { board_id: Uuid },
}
