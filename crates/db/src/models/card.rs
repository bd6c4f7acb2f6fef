//! Card rows and the column-scoped queries the position ledger is built on.
//!
//! A column is the set of cards sharing `(board_id, status)`. Positions are
//! zero-based and dense within a column; the queries here never enforce that
//! on their own, the ledger does by combining them inside one transaction.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, Type};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    EnumIter,
    Display,
    Default,
)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum CardStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl CardStatus {
    /// Left-to-right order of the columns on a board. Column locks are
    /// always taken in this order.
    pub fn ordinal(self) -> u8 {
        match self {
            CardStatus::Todo => 0,
            CardStatus::InProgress => 1,
            CardStatus::Done => 2,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    EnumIter,
    Display,
    Default,
)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} '{value}'")]
pub struct ParseFieldError {
    pub field: &'static str,
    pub value: String,
}

/// Lenient enum parsing for request payloads: case is ignored and `-` or
/// spaces stand in for `_`. A missing value yields the default; a present
/// but unknown value is an error.
fn parse_lenient<T>(field: &'static str, raw: Option<&str>) -> Result<T, ParseFieldError>
where
    T: FromStr + Default,
{
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(T::default());
    };
    let normalized = raw.replace(['-', ' '], "_");
    T::from_str(&normalized).map_err(|_| ParseFieldError {
        field,
        value: raw.to_string(),
    })
}

impl CardStatus {
    pub fn parse(raw: Option<&str>) -> Result<Self, ParseFieldError> {
        parse_lenient("status", raw)
    }
}

impl Priority {
    pub fn parse(raw: Option<&str>) -> Result<Self, ParseFieldError> {
        parse_lenient("priority", raw)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Card {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: CardStatus,
    pub position: i64,
    pub assignee_id: Option<Uuid>,
    pub created_by: Uuid,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Just enough of a card to reason about its place in a column.
#[derive(Debug, Clone, Copy, FromRow, PartialEq, Eq)]
pub struct CardSlot {
    pub id: Uuid,
    pub position: i64,
}

/// Validated input for a new card. The position is assigned by the ledger.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub board_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: CardStatus,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

/// Content fields of a card. `None` leaves the stored value unchanged.
/// Status and position are deliberately absent: they only change through
/// the ledger.
#[derive(Debug, Clone, Default)]
pub struct CardContentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

const CARD_COLUMNS: &str = "id, board_id, title, description, status, position, assignee_id, \
                            created_by, due_date, priority, created_at, updated_at";

impl Card {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Card>(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// A card id from another board is treated as absent.
    pub async fn find_in_board<'e, E>(
        executor: E,
        board_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = $1 AND board_id = $2"
        ))
        .bind(id)
        .bind(board_id)
        .fetch_optional(executor)
        .await
    }

    /// All cards of a board, column by column, each column by position.
    pub async fn find_by_board<'e, E>(executor: E, board_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Card>(&format!(
            r#"SELECT {CARD_COLUMNS} FROM cards
               WHERE board_id = $1
               ORDER BY CASE status WHEN 'TODO' THEN 0 WHEN 'IN_PROGRESS' THEN 1 ELSE 2 END,
                        position ASC"#
        ))
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    /// The column ordered by position.
    pub async fn column<'e, E>(
        executor: E,
        board_id: Uuid,
        status: CardStatus,
    ) -> Result<Vec<CardSlot>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        Self::column_from(executor, board_id, status, 0).await
    }

    /// Cards of the column at or after `from`, ordered by position.
    pub async fn column_from<'e, E>(
        executor: E,
        board_id: Uuid,
        status: CardStatus,
        from: i64,
    ) -> Result<Vec<CardSlot>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, CardSlot>(
            r#"SELECT id, position FROM cards
               WHERE board_id = $1 AND status = $2 AND position >= $3
               ORDER BY position ASC, created_at ASC"#,
        )
        .bind(board_id)
        .bind(status)
        .bind(from)
        .fetch_all(executor)
        .await
    }

    pub async fn column_len<'e, E>(
        executor: E,
        board_id: Uuid,
        status: CardStatus,
    ) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cards WHERE board_id = $1 AND status = $2",
        )
        .bind(board_id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    /// Adds `delta` to the position of every card in the column whose
    /// position lies in `[start, end)`; `end = None` means unbounded.
    pub async fn shift_range<'e, E>(
        executor: E,
        board_id: Uuid,
        status: CardStatus,
        start: i64,
        end: Option<i64>,
        delta: i64,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE cards
               SET position = position + $1, updated_at = $2
               WHERE board_id = $3 AND status = $4
                 AND position >= $5
                 AND ($6 IS NULL OR position < $6)"#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(board_id)
        .bind(status)
        .bind(start)
        .bind(end)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_placement<'e, E>(
        executor: E,
        id: Uuid,
        status: CardStatus,
        position: i64,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE cards SET status = $1, position = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(status)
        .bind(position)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert<'e, E>(
        executor: E,
        id: Uuid,
        data: &NewCard,
        position: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Card>(&format!(
            r#"INSERT INTO cards (id, board_id, title, description, status, position,
                                  assignee_id, created_by, due_date, priority,
                                  created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
               RETURNING {CARD_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.board_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.status)
        .bind(position)
        .bind(data.assignee_id)
        .bind(data.created_by)
        .bind(data.due_date)
        .bind(data.priority)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Applies the present fields of `update`; never touches status or
    /// position.
    pub async fn update_content<'e, E>(
        executor: E,
        id: Uuid,
        update: &CardContentUpdate,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Card>(&format!(
            r#"UPDATE cards SET
                   title       = COALESCE($1, title),
                   description = COALESCE($2, description),
                   priority    = COALESCE($3, priority),
                   assignee_id = COALESCE($4, assignee_id),
                   due_date    = COALESCE($5, due_date),
                   updated_at  = $6
               WHERE id = $7
               RETURNING {CARD_COLUMNS}"#
        ))
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.priority)
        .bind(update.assignee_id)
        .bind(update.due_date)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
