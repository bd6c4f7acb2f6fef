//! Presence for collaborative post editing.

use chrono::{DateTime, Duration, Utc};
use db::{RetryConfig, models::edit_session::EditSession, with_retry};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Created(EditSession),
    Refreshed(EditSession),
}

impl JoinOutcome {
    pub fn session(&self) -> &EditSession {
        match self {
            JoinOutcome::Created(session) | JoinOutcome::Refreshed(session) => session,
        }
    }
}

#[derive(Clone)]
pub struct SessionTracker {
    pool: SqlitePool,
    retry: RetryConfig,
}

impl SessionTracker {
    pub fn new(pool: SqlitePool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }

    /// Record that `transport_session` is editing `post_id`. Joining again
    /// only refreshes `last_active`.
    pub async fn join(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        transport_session: &str,
    ) -> Result<JoinOutcome, SessionError> {
        let (session, created) = with_retry(&self.retry, "join_edit_session", || {
            EditSession::upsert(&self.pool, post_id, user_id, transport_session, Utc::now())
        })
        .await?;

        if created {
            tracing::debug!(%post_id, %user_id, transport_session, "edit session opened");
            Ok(JoinOutcome::Created(session))
        } else {
            Ok(JoinOutcome::Refreshed(session))
        }
    }

    /// Any edit activity keeps the session alive.
    pub async fn touch(&self, post_id: Uuid, transport_session: &str) -> Result<bool, SessionError> {
        let updated = with_retry(&self.retry, "touch_edit_session", || {
            EditSession::touch(&self.pool, post_id, transport_session, Utc::now())
        })
        .await?;
        Ok(updated > 0)
    }

    /// Close one session. Other tabs of the same user stay open.
    pub async fn leave(&self, post_id: Uuid, transport_session: &str) -> Result<bool, SessionError> {
        let removed = with_retry(&self.retry, "leave_edit_session", || {
            EditSession::delete_by_post_and_session(&self.pool, post_id, transport_session)
        })
        .await?;
        Ok(removed > 0)
    }

    /// Close every session a transport connection opened.
    pub async fn drop_connection(&self, transport_session: &str) -> Result<u64, SessionError> {
        Ok(with_retry(&self.retry, "drop_edit_connection", || {
            EditSession::delete_by_session(&self.pool, transport_session)
        })
        .await?)
    }

    pub async fn active_sessions(&self, post_id: Uuid) -> Result<Vec<EditSession>, SessionError> {
        Ok(EditSession::find_by_post(&self.pool, post_id).await?)
    }

    /// Remove sessions idle for longer than `idle`.
    pub async fn sweep(&self, idle: Duration) -> Result<u64, SessionError> {
        self.sweep_at(Utc::now(), idle).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>, idle: Duration) -> Result<u64, SessionError> {
        let threshold = now - idle;
        Ok(with_retry(&self.retry, "sweep_edit_sessions", || {
            EditSession::delete_inactive_before(&self.pool, threshold)
        })
        .await?)
    }
}
