use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

/// Append-only discussion on a card.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CardComment {
    pub id: Uuid,
    pub card_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl CardComment {
    pub async fn create<'e, E>(
        executor: E,
        card_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, CardComment>(
            r#"INSERT INTO card_comments (id, card_id, author_id, content, created_at)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, card_id, author_id, content, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(card_id)
        .bind(author_id)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    /// Oldest first.
    pub async fn find_by_card<'e, E>(executor: E, card_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, CardComment>(
            r#"SELECT id, card_id, author_id, content, created_at
               FROM card_comments
               WHERE card_id = $1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(card_id)
        .fetch_all(executor)
        .await
    }

    pub async fn count<'e, E>(executor: E, card_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM card_comments WHERE card_id = $1")
            .bind(card_id)
            .fetch_one(executor)
            .await
    }

    pub async fn counts_by_board<'e, E>(
        executor: E,
        board_id: Uuid,
    ) -> Result<HashMap<Uuid, i64>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"SELECT cc.card_id, COUNT(*)
               FROM card_comments cc
               JOIN cards c ON c.id = cc.card_id
               WHERE c.board_id = $1
               GROUP BY cc.card_id"#,
        )
        .bind(board_id)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
