use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Board {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Board row plus the number of cards it holds, for list views.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct BoardSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub board: Board,
    pub card_count: i64,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateBoard {
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

const BOARD_COLUMNS: &str = "id, team_id, name, description, created_by, created_at, updated_at";

impl Board {
    pub async fn create<'e, E>(
        executor: E,
        data: &CreateBoard,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Board>(&format!(
            r#"INSERT INTO boards (id, team_id, name, description, created_by, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6)
               RETURNING {BOARD_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(data.team_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(created_by)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Boards of one team, newest first.
    pub async fn find_by_team<'e, E>(
        executor: E,
        team_id: Uuid,
    ) -> Result<Vec<BoardSummary>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, BoardSummary>(
            r#"SELECT b.id, b.team_id, b.name, b.description, b.created_by,
                      b.created_at, b.updated_at,
                      (SELECT COUNT(*) FROM cards c WHERE c.board_id = b.id) AS card_count
               FROM boards b
               WHERE b.team_id = $1
               ORDER BY b.created_at DESC"#,
        )
        .bind(team_id)
        .fetch_all(executor)
        .await
    }

    /// Every board in every team `user_id` belongs to, newest first.
    pub async fn find_for_member<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<BoardSummary>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, BoardSummary>(
            r#"SELECT b.id, b.team_id, b.name, b.description, b.created_by,
                      b.created_at, b.updated_at,
                      (SELECT COUNT(*) FROM cards c WHERE c.board_id = b.id) AS card_count
               FROM boards b
               JOIN team_members tm ON tm.team_id = b.team_id
               WHERE tm.user_id = $1
               ORDER BY b.created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Deletes the board; cards, checklist items and comments cascade.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
