use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

/// Checklist entries keep a dense zero-based position per card, the same
/// way cards do per column.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub card_id: Uuid,
    pub text: String,
    pub completed: bool,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

const ITEM_COLUMNS: &str = "id, card_id, text, completed, position, created_at";

impl ChecklistItem {
    pub async fn find_by_card<'e, E>(executor: E, card_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM checklist_items WHERE card_id = $1 ORDER BY position ASC"
        ))
        .bind(card_id)
        .fetch_all(executor)
        .await
    }

    /// Items for every card on a board, grouped by card then position.
    pub async fn find_by_board<'e, E>(
        executor: E,
        board_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItem>(
            r#"SELECT ci.id, ci.card_id, ci.text, ci.completed, ci.position, ci.created_at
               FROM checklist_items ci
               JOIN cards c ON c.id = ci.card_id
               WHERE c.board_id = $1
               ORDER BY ci.card_id, ci.position ASC"#,
        )
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_in_card<'e, E>(
        executor: E,
        card_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM checklist_items WHERE id = $1 AND card_id = $2"
        ))
        .bind(id)
        .bind(card_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn positions<'e, E>(executor: E, card_id: Uuid) -> Result<Vec<i64>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT position FROM checklist_items WHERE card_id = $1 ORDER BY position ASC",
        )
        .bind(card_id)
        .fetch_all(executor)
        .await
    }

    pub async fn count<'e, E>(executor: E, card_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM checklist_items WHERE card_id = $1")
            .bind(card_id)
            .fetch_one(executor)
            .await
    }

    pub async fn insert<'e, E>(
        executor: E,
        card_id: Uuid,
        text: &str,
        position: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            r#"INSERT INTO checklist_items (id, card_id, text, completed, position, created_at)
               VALUES ($1, $2, $3, 0, $4, $5)
               RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(card_id)
        .bind(text)
        .bind(position)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn toggle<'e, E>(
        executor: E,
        card_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ChecklistItem>(&format!(
            r#"UPDATE checklist_items SET completed = NOT completed
               WHERE id = $1 AND card_id = $2
               RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(id)
        .bind(card_id)
        .fetch_optional(executor)
        .await
    }

    /// Closes the gap left at `removed`.
    pub async fn shift_after<'e, E>(
        executor: E,
        card_id: Uuid,
        removed: i64,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE checklist_items SET position = position - 1 WHERE card_id = $1 AND position > $2",
        )
        .bind(card_id)
        .bind(removed)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM checklist_items WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
