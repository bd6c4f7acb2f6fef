use std::sync::Arc;

use db::{DBService, RetryConfig};
use services::services::{
    access_guard::BoardAccessGuard, broadcast_relay::BroadcastRelay,
    checklist_ledger::ChecklistLedger, column_locks::ColumnLocks, kanban::KanbanService,
    position_ledger::PositionLedger, session_tracker::SessionTracker,
};
use sqlx::SqlitePool;

use crate::auth::JwtService;

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    kanban: KanbanService,
    sessions: SessionTracker,
    relay: BroadcastRelay,
    jwt: Arc<JwtService>,
}

impl AppState {
    /// Wire every service onto one pool. The relay is shared between the
    /// board facade and the WebSocket endpoint.
    pub fn new(db: DBService, jwt: JwtService, retry: RetryConfig) -> Self {
        let pool = db.pool.clone();
        let relay = BroadcastRelay::new();
        let kanban = KanbanService::new(
            pool.clone(),
            BoardAccessGuard::sqlite(pool.clone()),
            PositionLedger::new(pool.clone(), ColumnLocks::new(), retry.clone()),
            ChecklistLedger::new(pool.clone(), retry.clone()),
            relay.clone(),
        );
        let sessions = SessionTracker::new(pool, retry);

        Self {
            db,
            kanban,
            sessions,
            relay,
            jwt: Arc::new(jwt),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    pub fn kanban(&self) -> &KanbanService {
        &self.kanban
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn relay(&self) -> &BroadcastRelay {
        &self.relay
    }

    pub fn jwt(&self) -> Arc<JwtService> {
        Arc::clone(&self.jwt)
    }
}
