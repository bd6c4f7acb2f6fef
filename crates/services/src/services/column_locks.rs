//! In-process mutual exclusion for ordered collections.
//!
//! Every mutation of a column (or of a card's checklist) runs while holding
//! the lock for that key. Operations spanning two columns take both locks in
//! ascending key order, so two cross-column moves in opposite directions
//! cannot deadlock.

use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;
use db::models::card::CardStatus;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One lock per key, created on first use.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }
}

/// Held locks. Dropping the guard releases all of them.
#[must_use]
#[derive(Debug)]
pub struct KeyedGuard {
    _held: Vec<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Ord + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the locks for every key in `keys`, duplicates collapsed,
    /// in ascending order.
    pub async fn lock_all(&self, keys: &[K]) -> KeyedGuard {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut held = Vec::with_capacity(ordered.len());
        for key in ordered {
            let mutex = Arc::clone(self.locks.entry(key).or_default().value());
            held.push(mutex.lock_owned().await);
        }
        KeyedGuard { _held: held }
    }

    pub async fn lock(&self, key: K) -> KeyedGuard {
        self.lock_all(std::slice::from_ref(&key)).await
    }

    /// Drop lock entries matching `predicate`. Holders keep their own
    /// reference, so this is safe while a lock is held.
    pub fn forget(&self, predicate: impl Fn(&K) -> bool) {
        self.locks.retain(|key, _| !predicate(key));
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// `(board, column)`; ordered by board, then by the column's board ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub board_id: Uuid,
    pub status: CardStatus,
}

impl ColumnKey {
    pub fn new(board_id: Uuid, status: CardStatus) -> Self {
        Self { board_id, status }
    }
}

impl PartialOrd for ColumnKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.board_id
            .cmp(&other.board_id)
            .then_with(|| self.status.ordinal().cmp(&other.status.ordinal()))
    }
}

pub type ColumnLocks = KeyedLocks<ColumnKey>;

/// Checklists are keyed by card id.
pub type ChecklistLocks = KeyedLocks<Uuid>;

impl ColumnLocks {
    pub async fn lock_columns(&self, board_id: Uuid, statuses: &[CardStatus]) -> KeyedGuard {
        let keys: Vec<ColumnKey> = statuses
            .iter()
            .map(|status| ColumnKey::new(board_id, *status))
            .collect();
        self.lock_all(&keys).await
    }

    pub fn forget_board(&self, board_id: Uuid) {
        self.forget(|key| key.board_id == board_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_column_is_exclusive() {
        let locks = ColumnLocks::new();
        let board = Uuid::new_v4();

        let guard = locks.lock_columns(board, &[CardStatus::Todo]).await;

        let contender = locks.clone();
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            contender.lock_columns(board, &[CardStatus::Todo]),
        )
        .await;
        assert!(blocked.is_err(), "second lock on the same column must wait");

        drop(guard);
        let _reacquired = locks.lock_columns(board, &[CardStatus::Todo]).await;
    }

    #[tokio::test]
    async fn test_other_columns_stay_available() {
        let locks = ColumnLocks::new();
        let board = Uuid::new_v4();

        let _todo = locks.lock_columns(board, &[CardStatus::Todo]).await;
        let done = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock_columns(board, &[CardStatus::Done]),
        )
        .await;
        assert!(done.is_ok());
    }

    #[tokio::test]
    async fn test_opposite_cross_column_moves_do_not_deadlock() {
        let locks = ColumnLocks::new();
        let board = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..20 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                let pair = if i % 2 == 0 {
                    [CardStatus::Todo, CardStatus::Done]
                } else {
                    [CardStatus::Done, CardStatus::Todo]
                };
                let _guard = locks.lock_columns(board, &pair).await;
                tokio::task::yield_now().await;
            }));
        }

        let all = async {
            for handle in handles {
                handle.await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(5), all)
            .await
            .expect("lock ordering must prevent deadlock");
    }

    #[tokio::test]
    async fn test_duplicate_keys_collapse_and_forget_board() {
        let locks = ColumnLocks::new();
        let board = Uuid::new_v4();

        // Same status twice must not self-deadlock.
        let guard = locks
            .lock_columns(board, &[CardStatus::Todo, CardStatus::Todo])
            .await;
        drop(guard);
        assert_eq!(locks.len(), 1);

        locks.forget_board(board);
        assert!(locks.is_empty());
    }
}
