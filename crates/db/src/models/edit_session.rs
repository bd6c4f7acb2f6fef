//! Presence rows for collaborative post editing.
//!
//! A row is keyed by `(post_id, session_id)` where `session_id` is the
//! transport-level connection identifier, so one user with two tabs holds
//! two sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct EditSession {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub connected_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

const SESSION_COLUMNS: &str = "id, post_id, user_id, session_id, connected_at, last_active";

impl EditSession {
    /// Create the session or refresh `last_active` when it already exists.
    /// Returns the row and whether it was newly created.
    pub async fn upsert<'e, E>(
        executor: E,
        post_id: Uuid,
        user_id: Uuid,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Self, bool), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let candidate_id = Uuid::new_v4();
        let session = sqlx::query_as::<_, EditSession>(&format!(
            r#"INSERT INTO edit_sessions (id, post_id, user_id, session_id, connected_at, last_active)
               VALUES ($1, $2, $3, $4, $5, $5)
               ON CONFLICT (post_id, session_id) DO UPDATE SET last_active = excluded.last_active
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(candidate_id)
        .bind(post_id)
        .bind(user_id)
        .bind(session_id)
        .bind(now)
        .fetch_one(executor)
        .await?;

        let created = session.id == candidate_id;
        Ok((session, created))
    }

    /// Refresh `last_active` of an existing session. Unknown pairs are left alone.
    pub async fn touch<'e, E>(
        executor: E,
        post_id: Uuid,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE edit_sessions SET last_active = $1 WHERE post_id = $2 AND session_id = $3",
        )
        .bind(now)
        .bind(post_id)
        .bind(session_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_post<'e, E>(executor: E, post_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, EditSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM edit_sessions WHERE post_id = $1 ORDER BY connected_at ASC"
        ))
        .bind(post_id)
        .fetch_all(executor)
        .await
    }

    pub async fn delete_by_post_and_session<'e, E>(
        executor: E,
        post_id: Uuid,
        session_id: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result =
            sqlx::query("DELETE FROM edit_sessions WHERE post_id = $1 AND session_id = $2")
                .bind(post_id)
                .bind(session_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    /// Drop every session opened by one transport connection.
    pub async fn delete_by_session<'e, E>(executor: E, session_id: &str) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM edit_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove sessions whose `last_active` is strictly before `threshold`.
    pub async fn delete_inactive_before<'e, E>(
        executor: E,
        threshold: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result =
            sqlx::query("DELETE FROM edit_sessions WHERE julianday(last_active) < julianday($1)")
                .bind(threshold)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }
}
