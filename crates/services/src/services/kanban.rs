//! Board and card use cases.
//!
//! Each public method authorizes the actor against the board's team, applies
//! the change through the position or checklist ledger, and publishes a
//! board-topic event on success. Reads need membership; deleting a board
//! needs an elevated role.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::{
    is_retryable_error,
    models::{
        board::{Board, BoardSummary, CreateBoard},
        card::{Card, CardContentUpdate, CardStatus, NewCard, ParseFieldError, Priority},
        card_comment::CardComment,
        checklist_item::ChecklistItem,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    access_guard::{AccessError, BoardAccessGuard},
    broadcast_relay::{BroadcastRelay, Topic},
    checklist_ledger::ChecklistLedger,
    events::{BoardEvent, CardMoveMessage},
    position_ledger::{LedgerError, PositionLedger},
};

pub const BOARD_NAME_MAX: usize = 100;
pub const BOARD_DESCRIPTION_MAX: usize = 1000;
pub const CARD_TITLE_MAX: usize = 200;
pub const CARD_DESCRIPTION_MAX: usize = 5000;
pub const CHECKLIST_TEXT_MAX: usize = 200;
pub const COMMENT_MAX: usize = 1000;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("the column kept changing underneath this request, try again")]
    InvariantViolation,
    #[error("the store is temporarily unavailable")]
    TransientStoreFailure(#[source] sqlx::Error),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for KanbanError {
    fn from(e: sqlx::Error) -> Self {
        if is_retryable_error(&e) {
            KanbanError::TransientStoreFailure(e)
        } else {
            KanbanError::Database(e)
        }
    }
}

impl From<LedgerError> for KanbanError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::CardNotFound => KanbanError::NotFound("card"),
            LedgerError::ChecklistItemNotFound => KanbanError::NotFound("checklist item"),
            LedgerError::InvariantViolation { scope, detail } => {
                tracing::error!(%scope, %detail, "ordering conflict persisted after retries");
                KanbanError::InvariantViolation
            }
            LedgerError::Database(e) => e.into(),
        }
    }
}

impl From<AccessError> for KanbanError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::PermissionDenied(reason) => KanbanError::PermissionDenied(reason),
            AccessError::Database(e) => e.into(),
        }
    }
}

impl From<ParseFieldError> for KanbanError {
    fn from(e: ParseFieldError) -> Self {
        KanbanError::Validation(e.to_string())
    }
}

// ============================================================================
// Requests and views
// ============================================================================

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateCardRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct MoveCardRequest {
    pub status: String,
    pub position: i64,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateChecklistItemRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CardSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    pub card: Card,
    pub checklist: Vec<ChecklistItem>,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct BoardDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub board: Board,
    pub cards: Vec<CardSummary>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CardDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub card: Card,
    pub checklist: Vec<ChecklistItem>,
    pub comments: Vec<CardComment>,
}

// ============================================================================
// Validation
// ============================================================================

fn required_text(field: &str, value: &str, max: usize) -> Result<String, KanbanError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(KanbanError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(KanbanError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, KanbanError> {
    match value {
        Some(text) if text.chars().count() > max => Err(KanbanError::Validation(format!(
            "{field} must be at most {max} characters"
        ))),
        Some(text) => Ok(Some(text.to_string())),
        None => Ok(None),
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct KanbanService {
    pool: SqlitePool,
    guard: BoardAccessGuard,
    ledger: PositionLedger,
    checklist: ChecklistLedger,
    relay: BroadcastRelay,
}

impl KanbanService {
    pub fn new(
        pool: SqlitePool,
        guard: BoardAccessGuard,
        ledger: PositionLedger,
        checklist: ChecklistLedger,
        relay: BroadcastRelay,
    ) -> Self {
        Self {
            pool,
            guard,
            ledger,
            checklist,
            relay,
        }
    }

    /// Load a board and check that `user_id` belongs to its team.
    pub async fn authorize_board(&self, board_id: Uuid, user_id: Uuid) -> Result<Board, KanbanError> {
        let board = Board::find_by_id(&self.pool, board_id)
            .await?
            .ok_or(KanbanError::NotFound("board"))?;
        self.guard.require_member(board.team_id, user_id).await?;
        Ok(board)
    }

    async fn authorize_card(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Board, Card), KanbanError> {
        let board = self.authorize_board(board_id, user_id).await?;
        let card = Card::find_in_board(&self.pool, board_id, card_id)
            .await?
            .ok_or(KanbanError::NotFound("card"))?;
        Ok((board, card))
    }

    /// Events are best effort; a failed publish never fails the mutation.
    async fn publish<T: Serialize>(&self, board_id: Uuid, payload: &T) {
        if let Err(e) = self.relay.publish(&Topic::Board(board_id), payload).await {
            tracing::warn!(%board_id, error = %e, "failed to publish board event");
        }
    }

    // ---------------------------------------------------------------- boards

    pub async fn create_board(&self, user_id: Uuid, data: CreateBoard) -> Result<Board, KanbanError> {
        let data = CreateBoard {
            team_id: data.team_id,
            name: required_text("name", &data.name, BOARD_NAME_MAX)?,
            description: optional_text(
                "description",
                data.description.as_deref(),
                BOARD_DESCRIPTION_MAX,
            )?,
        };
        self.guard.require_member(data.team_id, user_id).await?;

        let board = Board::create(&self.pool, &data, user_id).await?;
        tracing::info!(board_id = %board.id, team_id = %board.team_id, "board created");
        Ok(board)
    }

    pub async fn list_my_boards(&self, user_id: Uuid) -> Result<Vec<BoardSummary>, KanbanError> {
        Ok(Board::find_for_member(&self.pool, user_id).await?)
    }

    pub async fn list_team_boards(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<BoardSummary>, KanbanError> {
        self.guard.require_member(team_id, user_id).await?;
        Ok(Board::find_by_team(&self.pool, team_id).await?)
    }

    pub async fn get_board(&self, board_id: Uuid, user_id: Uuid) -> Result<BoardDetails, KanbanError> {
        let board = self.authorize_board(board_id, user_id).await?;

        let cards = Card::find_by_board(&self.pool, board_id).await?;
        let mut checklists: HashMap<Uuid, Vec<ChecklistItem>> = HashMap::new();
        for item in ChecklistItem::find_by_board(&self.pool, board_id).await? {
            checklists.entry(item.card_id).or_default().push(item);
        }
        let comment_counts = CardComment::counts_by_board(&self.pool, board_id).await?;

        let cards = cards
            .into_iter()
            .map(|card| CardSummary {
                checklist: checklists.remove(&card.id).unwrap_or_default(),
                comment_count: comment_counts.get(&card.id).copied().unwrap_or(0),
                card,
            })
            .collect();

        Ok(BoardDetails { board, cards })
    }

    /// Owners and admins only. Cards, checklists and comments go with it.
    pub async fn delete_board(&self, board_id: Uuid, user_id: Uuid) -> Result<(), KanbanError> {
        let board = Board::find_by_id(&self.pool, board_id)
            .await?
            .ok_or(KanbanError::NotFound("board"))?;
        self.guard.require_elevated(board.team_id, user_id).await?;

        let card_ids: Vec<Uuid> = Card::find_by_board(&self.pool, board_id)
            .await?
            .into_iter()
            .map(|card| card.id)
            .collect();
        if Board::delete(&self.pool, board_id).await? == 0 {
            return Err(KanbanError::NotFound("board"));
        }
        self.ledger.locks().forget_board(board_id);
        for card_id in card_ids {
            self.checklist.forget_card(card_id);
        }

        tracing::info!(%board_id, %user_id, "board deleted");
        self.publish(board_id, &BoardEvent::BoardDeleted { board_id })
            .await;
        Ok(())
    }

    // ----------------------------------------------------------------- cards

    pub async fn create_card(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        request: CreateCardRequest,
    ) -> Result<Card, KanbanError> {
        let data = NewCard {
            board_id,
            title: required_text("title", &request.title, CARD_TITLE_MAX)?,
            description: optional_text(
                "description",
                request.description.as_deref(),
                CARD_DESCRIPTION_MAX,
            )?,
            status: CardStatus::parse(request.status.as_deref())?,
            priority: Priority::parse(request.priority.as_deref())?,
            assignee_id: request.assignee_id,
            due_date: request.due_date,
            created_by: user_id,
        };
        self.authorize_board(board_id, user_id).await?;

        let card = self.ledger.insert(&data).await?;
        self.publish(board_id, &BoardEvent::CardCreated { card: card.clone() })
            .await;
        Ok(card)
    }

    pub async fn get_card(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
    ) -> Result<CardDetails, KanbanError> {
        let (_, card) = self.authorize_card(board_id, card_id, user_id).await?;
        self.card_details(card).await
    }

    async fn card_details(&self, card: Card) -> Result<CardDetails, KanbanError> {
        let checklist = ChecklistItem::find_by_card(&self.pool, card.id).await?;
        let comments = CardComment::find_by_card(&self.pool, card.id).await?;
        Ok(CardDetails {
            card,
            checklist,
            comments,
        })
    }

    /// Partial content update; status and position are never touched here.
    pub async fn update_card(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
        request: UpdateCardRequest,
    ) -> Result<Card, KanbanError> {
        let update = CardContentUpdate {
            title: request
                .title
                .as_deref()
                .map(|title| required_text("title", title, CARD_TITLE_MAX))
                .transpose()?,
            description: optional_text(
                "description",
                request.description.as_deref(),
                CARD_DESCRIPTION_MAX,
            )?,
            priority: request
                .priority
                .as_deref()
                .map(|raw| Priority::parse(Some(raw)))
                .transpose()?,
            assignee_id: request.assignee_id,
            due_date: request.due_date,
        };
        self.authorize_card(board_id, card_id, user_id).await?;

        let card = Card::update_content(&self.pool, card_id, &update)
            .await?
            .ok_or(KanbanError::NotFound("card"))?;
        self.publish(board_id, &BoardEvent::CardUpdated { card: card.clone() })
            .await;
        Ok(card)
    }

    /// Reposition a card and announce its final placement on the board topic.
    pub async fn move_card(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
        request: MoveCardRequest,
    ) -> Result<Card, KanbanError> {
        if request.status.trim().is_empty() {
            return Err(KanbanError::Validation("status is required".to_string()));
        }
        let target_status = CardStatus::parse(Some(&request.status))?;
        self.authorize_card(board_id, card_id, user_id).await?;

        let moved = self
            .ledger
            .move_card(board_id, card_id, target_status, request.position)
            .await?;

        if !moved.is_noop() {
            tracing::info!(
                %board_id,
                %card_id,
                from = %moved.from_status,
                to = %moved.card.status,
                position = moved.card.position,
                "card moved"
            );
        }

        let notice = CardMoveMessage {
            card_id,
            board_id,
            status: moved.card.status,
            position: moved.card.position,
            user_id: Some(user_id),
            username: None,
            timestamp: None,
        };
        self.publish(board_id, &notice).await;
        Ok(moved.card)
    }

    pub async fn delete_card(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), KanbanError> {
        self.authorize_card(board_id, card_id, user_id).await?;

        let removed = self.ledger.remove(board_id, card_id).await?;
        self.checklist.forget_card(card_id);
        self.publish(
            board_id,
            &BoardEvent::CardDeleted {
                card_id,
                status: removed.status,
                position: removed.position,
            },
        )
        .await;
        Ok(())
    }

    // ------------------------------------------------------------- checklist

    async fn publish_checklist(&self, board_id: Uuid, card: Card) -> Result<CardDetails, KanbanError> {
        let details = self.card_details(card).await?;
        self.publish(
            board_id,
            &BoardEvent::ChecklistChanged {
                card_id: details.card.id,
                items: details.checklist.clone(),
            },
        )
        .await;
        Ok(details)
    }

    pub async fn add_checklist_item(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
        request: CreateChecklistItemRequest,
    ) -> Result<CardDetails, KanbanError> {
        let text = required_text("text", &request.text, CHECKLIST_TEXT_MAX)?;
        let (_, card) = self.authorize_card(board_id, card_id, user_id).await?;

        self.checklist.add_item(card_id, &text).await?;
        self.publish_checklist(board_id, card).await
    }

    pub async fn toggle_checklist_item(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        item_id: Uuid,
        user_id: Uuid,
    ) -> Result<CardDetails, KanbanError> {
        let (_, card) = self.authorize_card(board_id, card_id, user_id).await?;

        self.checklist.toggle_item(card_id, item_id).await?;
        self.publish_checklist(board_id, card).await
    }

    pub async fn delete_checklist_item(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        item_id: Uuid,
        user_id: Uuid,
    ) -> Result<CardDetails, KanbanError> {
        let (_, card) = self.authorize_card(board_id, card_id, user_id).await?;

        self.checklist.remove_item(card_id, item_id).await?;
        self.publish_checklist(board_id, card).await
    }

    // -------------------------------------------------------------- comments

    pub async fn add_comment(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
        request: CreateCommentRequest,
    ) -> Result<CardComment, KanbanError> {
        let content = required_text("content", &request.content, COMMENT_MAX)?;
        self.authorize_card(board_id, card_id, user_id).await?;

        let comment = CardComment::create(&self.pool, card_id, user_id, &content).await?;
        let comment_count = CardComment::count(&self.pool, card_id).await?;
        self.publish(
            board_id,
            &BoardEvent::CommentAdded {
                card_id,
                comment_count,
            },
        )
        .await;
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<CardComment>, KanbanError> {
        self.authorize_card(board_id, card_id, user_id).await?;
        Ok(CardComment::find_by_card(&self.pool, card_id).await?)
    }
}
