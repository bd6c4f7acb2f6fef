//! Dense ordering of cards within board columns.
//!
//! Every column `(board, status)` holds positions `0..n` with no gaps and no
//! duplicates. Each ledger operation runs under the column lock(s) it
//! touches, inside a single SQLite transaction, and re-reads the affected
//! columns before committing. A column that fails that check rolls the
//! transaction back with [`LedgerError::InvariantViolation`], which the
//! retry loop treats as a conflict worth another attempt.

use db::{
    RetryConfig, Retryable, is_retryable_error,
    models::card::{Card, CardStatus, NewCard},
    with_retry,
};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use super::column_locks::ColumnLocks;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("card not found")]
    CardNotFound,
    #[error("checklist item not found")]
    ChecklistItemNotFound,
    #[error("positions in {scope} are not dense: {detail}")]
    InvariantViolation { scope: String, detail: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Retryable for LedgerError {
    fn is_retryable(&self) -> bool {
        match self {
            LedgerError::InvariantViolation { .. } => true,
            LedgerError::Database(e) => is_retryable_error(e),
            _ => false,
        }
    }
}

/// Where a card was and where it ended up.
#[derive(Debug, Clone, Serialize)]
pub struct CardMove {
    pub card: Card,
    pub from_status: CardStatus,
    pub from_position: i64,
}

impl CardMove {
    pub fn is_noop(&self) -> bool {
        self.from_status == self.card.status && self.from_position == self.card.position
    }
}

/// Clamp a requested position into `0..=max`.
pub fn clamp_position(requested: i64, max: i64) -> i64 {
    requested.clamp(0, max.max(0))
}

/// Checks that `positions`, already sorted ascending, are exactly `0..n`.
pub fn check_dense(positions: &[i64]) -> Result<(), String> {
    for (expected, actual) in positions.iter().enumerate() {
        if *actual != expected as i64 {
            return Err(format!(
                "expected position {expected}, found {actual} (column of {})",
                positions.len()
            ));
        }
    }
    Ok(())
}

fn column_scope(board_id: Uuid, status: CardStatus) -> String {
    format!("board {board_id} column {status}")
}

/// Re-read a column inside the current transaction and fail if it is not dense.
pub async fn verify_column(
    conn: &mut SqliteConnection,
    board_id: Uuid,
    status: CardStatus,
) -> Result<(), LedgerError> {
    let positions: Vec<i64> = Card::column(&mut *conn, board_id, status)
        .await?
        .into_iter()
        .map(|slot| slot.position)
        .collect();
    check_dense(&positions).map_err(|detail| LedgerError::InvariantViolation {
        scope: column_scope(board_id, status),
        detail,
    })
}

/// Reposition a card inside its own column.
///
/// Moving down (`old < new`) pulls `(old, new]` up by one; moving up pulls
/// `[new, old)` down by one. The card itself sits at `old`, outside both
/// ranges. `new_position` must already be clamped to `0..len`.
pub async fn move_within_column(
    conn: &mut SqliteConnection,
    board_id: Uuid,
    status: CardStatus,
    card_id: Uuid,
    old_position: i64,
    new_position: i64,
) -> Result<(), LedgerError> {
    if old_position == new_position {
        return Ok(());
    }

    if old_position < new_position {
        Card::shift_range(
            &mut *conn,
            board_id,
            status,
            old_position + 1,
            Some(new_position + 1),
            -1,
        )
        .await?;
    } else {
        Card::shift_range(
            &mut *conn,
            board_id,
            status,
            new_position,
            Some(old_position),
            1,
        )
        .await?;
    }

    Card::set_placement(&mut *conn, card_id, status, new_position).await?;
    Ok(())
}

/// Move a card from one column to another.
///
/// Closes the gap in the source column, opens one at `new_position` in the
/// target column, then places the card. `new_position` must already be
/// clamped to `0..=len(target)`.
pub async fn move_across_columns(
    conn: &mut SqliteConnection,
    board_id: Uuid,
    card_id: Uuid,
    old_status: CardStatus,
    old_position: i64,
    new_status: CardStatus,
    new_position: i64,
) -> Result<(), LedgerError> {
    Card::shift_range(&mut *conn, board_id, old_status, old_position + 1, None, -1).await?;
    Card::shift_range(&mut *conn, board_id, new_status, new_position, None, 1).await?;
    Card::set_placement(&mut *conn, card_id, new_status, new_position).await?;
    Ok(())
}

/// Delete a card and close the gap it leaves.
pub async fn remove_from_column(
    conn: &mut SqliteConnection,
    board_id: Uuid,
    status: CardStatus,
    card_id: Uuid,
    position: i64,
) -> Result<(), LedgerError> {
    if Card::delete(&mut *conn, card_id).await? == 0 {
        return Err(LedgerError::CardNotFound);
    }
    Card::shift_range(&mut *conn, board_id, status, position + 1, None, -1).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PositionLedger {
    pool: SqlitePool,
    locks: ColumnLocks,
    retry: RetryConfig,
}

impl PositionLedger {
    pub fn new(pool: SqlitePool, locks: ColumnLocks, retry: RetryConfig) -> Self {
        Self { pool, locks, retry }
    }

    pub fn locks(&self) -> &ColumnLocks {
        &self.locks
    }

    /// Append a new card to the end of its column.
    pub async fn insert(&self, data: &NewCard) -> Result<Card, LedgerError> {
        let card_id = Uuid::new_v4();
        with_retry(&self.retry, "insert_card", || self.try_insert(card_id, data)).await
    }

    /// Move a card to `target_status` at `target_position`. Out-of-range
    /// positions are clamped to the nearest valid slot.
    pub async fn move_card(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        target_status: CardStatus,
        target_position: i64,
    ) -> Result<CardMove, LedgerError> {
        with_retry(&self.retry, "move_card", || {
            self.try_move(board_id, card_id, target_status, target_position)
        })
        .await
    }

    /// Delete a card, keeping its column dense.
    pub async fn remove(&self, board_id: Uuid, card_id: Uuid) -> Result<Card, LedgerError> {
        with_retry(&self.retry, "remove_card", || self.try_remove(board_id, card_id)).await
    }

    async fn try_insert(&self, card_id: Uuid, data: &NewCard) -> Result<Card, LedgerError> {
        let _guard = self
            .locks
            .lock_columns(data.board_id, &[data.status])
            .await;
        let mut tx = self.pool.begin().await?;

        let position = Card::column_len(&mut *tx, data.board_id, data.status).await?;
        let card = Card::insert(&mut *tx, card_id, data, position).await?;
        verify_column(&mut tx, data.board_id, data.status).await?;

        tx.commit().await?;
        tracing::debug!(card_id = %card.id, status = %card.status, position, "card inserted");
        Ok(card)
    }

    async fn try_move(
        &self,
        board_id: Uuid,
        card_id: Uuid,
        target_status: CardStatus,
        target_position: i64,
    ) -> Result<CardMove, LedgerError> {
        // The source column is only known after a read; it is confirmed
        // again under the lock.
        let observed = Card::find_in_board(&self.pool, board_id, card_id)
            .await?
            .ok_or(LedgerError::CardNotFound)?;
        let _guard = self
            .locks
            .lock_columns(board_id, &[observed.status, target_status])
            .await;
        let mut tx = self.pool.begin().await?;

        let card = Card::find_in_board(&mut *tx, board_id, card_id)
            .await?
            .ok_or(LedgerError::CardNotFound)?;
        if card.status != observed.status {
            return Err(LedgerError::InvariantViolation {
                scope: column_scope(board_id, observed.status),
                detail: format!("card {card_id} left the column before the lock was acquired"),
            });
        }

        let (from_status, from_position) = (card.status, card.position);

        if from_status == target_status {
            let len = Card::column_len(&mut *tx, board_id, from_status).await?;
            let new_position = clamp_position(target_position, len - 1);
            if new_position == from_position {
                return Ok(CardMove {
                    card,
                    from_status,
                    from_position,
                });
            }
            move_within_column(
                &mut tx,
                board_id,
                from_status,
                card_id,
                from_position,
                new_position,
            )
            .await?;
            verify_column(&mut tx, board_id, from_status).await?;
        } else {
            let len = Card::column_len(&mut *tx, board_id, target_status).await?;
            let new_position = clamp_position(target_position, len);
            move_across_columns(
                &mut tx,
                board_id,
                card_id,
                from_status,
                from_position,
                target_status,
                new_position,
            )
            .await?;
            verify_column(&mut tx, board_id, from_status).await?;
            verify_column(&mut tx, board_id, target_status).await?;
        }

        let card = Card::find_by_id(&mut *tx, card_id)
            .await?
            .ok_or(LedgerError::CardNotFound)?;
        tx.commit().await?;

        tracing::debug!(
            card_id = %card_id,
            from = %from_status,
            from_position,
            to = %card.status,
            to_position = card.position,
            "card moved"
        );

        Ok(CardMove {
            card,
            from_status,
            from_position,
        })
    }

    async fn try_remove(&self, board_id: Uuid, card_id: Uuid) -> Result<Card, LedgerError> {
        let observed = Card::find_in_board(&self.pool, board_id, card_id)
            .await?
            .ok_or(LedgerError::CardNotFound)?;
        let _guard = self.locks.lock_columns(board_id, &[observed.status]).await;
        let mut tx = self.pool.begin().await?;

        let card = Card::find_in_board(&mut *tx, board_id, card_id)
            .await?
            .ok_or(LedgerError::CardNotFound)?;
        if card.status != observed.status {
            return Err(LedgerError::InvariantViolation {
                scope: column_scope(board_id, observed.status),
                detail: format!("card {card_id} left the column before the lock was acquired"),
            });
        }

        remove_from_column(&mut tx, board_id, card.status, card_id, card.position).await?;
        verify_column(&mut tx, board_id, card.status).await?;
        tx.commit().await?;

        tracing::debug!(card_id = %card_id, status = %card.status, "card removed");
        Ok(card)
    }
}
