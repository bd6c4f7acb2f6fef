//! Checklist items keep the same dense-position rule as cards, scoped to
//! their card instead of a column.

use db::{RetryConfig, models::checklist_item::ChecklistItem, with_retry};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{
    column_locks::ChecklistLocks,
    position_ledger::{LedgerError, check_dense},
};

async fn verify_checklist(conn: &mut SqliteConnection, card_id: Uuid) -> Result<(), LedgerError> {
    let positions = ChecklistItem::positions(&mut *conn, card_id).await?;
    check_dense(&positions).map_err(|detail| LedgerError::InvariantViolation {
        scope: format!("checklist of card {card_id}"),
        detail,
    })
}

#[derive(Clone)]
pub struct ChecklistLedger {
    pool: SqlitePool,
    locks: ChecklistLocks,
    retry: RetryConfig,
}

impl ChecklistLedger {
    pub fn new(pool: SqlitePool, retry: RetryConfig) -> Self {
        Self {
            pool,
            locks: ChecklistLocks::new(),
            retry,
        }
    }

    pub fn locks(&self) -> &ChecklistLocks {
        &self.locks
    }

    /// Append an unchecked item.
    pub async fn add_item(&self, card_id: Uuid, text: &str) -> Result<ChecklistItem, LedgerError> {
        with_retry(&self.retry, "add_checklist_item", || self.try_add(card_id, text)).await
    }

    /// Flip `completed`. Positions are untouched.
    pub async fn toggle_item(
        &self,
        card_id: Uuid,
        item_id: Uuid,
    ) -> Result<ChecklistItem, LedgerError> {
        with_retry(&self.retry, "toggle_checklist_item", || {
            self.try_toggle(card_id, item_id)
        })
        .await
    }

    /// Delete an item and close the gap behind it.
    pub async fn remove_item(
        &self,
        card_id: Uuid,
        item_id: Uuid,
    ) -> Result<ChecklistItem, LedgerError> {
        with_retry(&self.retry, "remove_checklist_item", || {
            self.try_remove(card_id, item_id)
        })
        .await
    }

    async fn try_add(&self, card_id: Uuid, text: &str) -> Result<ChecklistItem, LedgerError> {
        let _guard = self.locks.lock(card_id).await;
        let mut tx = self.pool.begin().await?;

        let position = ChecklistItem::count(&mut *tx, card_id).await?;
        let item = ChecklistItem::insert(&mut *tx, card_id, text, position).await?;
        verify_checklist(&mut tx, card_id).await?;

        tx.commit().await?;
        Ok(item)
    }

    async fn try_toggle(&self, card_id: Uuid, item_id: Uuid) -> Result<ChecklistItem, LedgerError> {
        ChecklistItem::toggle(&self.pool, card_id, item_id)
            .await?
            .ok_or(LedgerError::ChecklistItemNotFound)
    }

    async fn try_remove(&self, card_id: Uuid, item_id: Uuid) -> Result<ChecklistItem, LedgerError> {
        let _guard = self.locks.lock(card_id).await;
        let mut tx = self.pool.begin().await?;

        let item = ChecklistItem::find_in_card(&mut *tx, card_id, item_id)
            .await?
            .ok_or(LedgerError::ChecklistItemNotFound)?;
        ChecklistItem::delete(&mut *tx, item.id).await?;
        ChecklistItem::shift_after(&mut *tx, card_id, item.position).await?;
        verify_checklist(&mut tx, card_id).await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Release the lock entry of a deleted card.
    pub fn forget_card(&self, card_id: Uuid) {
        self.locks.forget(|key| *key == card_id);
    }
}
