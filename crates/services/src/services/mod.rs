pub mod access_guard;
pub mod broadcast_relay;
pub mod checklist_ledger;
pub mod column_locks;
pub mod events;
pub mod kanban;
pub mod position_ledger;
pub mod session_sweeper;
pub mod session_tracker;
