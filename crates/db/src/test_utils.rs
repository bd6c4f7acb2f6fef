//! Test utilities for database tests.
//!
//! Pools are built from a template database that has migrations applied
//! once, then copied per test. Seeding helpers create the team and board
//! rows most tests need before they can touch cards.

use std::{str::FromStr, sync::OnceLock, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tempfile::TempDir;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::models::{
    board::{Board, CreateBoard},
    team::Team,
    team_member::{TeamMember, TeamRole},
};

static TEMPLATE_DIR: OnceLock<TempDir> = OnceLock::new();
static TEMPLATE_READY: OnceCell<()> = OnceCell::const_new();

fn get_template_dir() -> &'static TempDir {
    TEMPLATE_DIR.get_or_init(|| TempDir::new().expect("Failed to create template temp dir"))
}

async fn ensure_template_ready() {
    TEMPLATE_READY
        .get_or_init(|| async {
            let template_path = get_template_dir().path().join("template.db");

            let options =
                SqliteConnectOptions::from_str(&format!("sqlite://{}", template_path.display()))
                    .expect("Invalid template database URL")
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Delete);

            let pool = SqlitePoolOptions::new()
                .min_connections(0)
                .max_connections(1)
                .connect_with(options)
                .await
                .expect("Failed to create template pool");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run migrations on template");

            pool.close().await;

            tracing::debug!("Template database ready at {:?}", template_path);
        })
        .await;
}

/// Create a test database pool with migrations applied.
///
/// Returns the pool and a TempDir that must be kept alive for the duration
/// of the test.
pub async fn create_test_pool() -> (SqlitePool, TempDir) {
    ensure_template_ready().await;

    let temp_dir = TempDir::new().expect("Failed to create test temp dir");
    let db_path = temp_dir.path().join("test.db");

    let template_path = get_template_dir().path().join("template.db");
    std::fs::copy(&template_path, &db_path).expect("Failed to copy template database");

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
        .expect("Invalid test database URL")
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .expect("Failed to create test pool");

    (pool, temp_dir)
}

/// A team with one member holding `role`. Returns `(team_id, user_id)`.
pub async fn seed_team(pool: &SqlitePool, role: TeamRole) -> (Uuid, Uuid) {
    let team = Team::create(pool, "Test Team")
        .await
        .expect("Failed to create team");
    let user_id = Uuid::new_v4();
    TeamMember::add(pool, team.id, user_id, role)
        .await
        .expect("Failed to add team member");
    (team.id, user_id)
}

/// A board inside a fresh team. Returns `(board, owner_user_id)`.
pub async fn seed_board(pool: &SqlitePool) -> (Board, Uuid) {
    let (team_id, user_id) = seed_team(pool, TeamRole::Owner).await;
    let board = Board::create(
        pool,
        &CreateBoard {
            team_id,
            name: "Test Board".to_string(),
            description: None,
        },
        user_id,
    )
    .await
    .expect("Failed to create board");
    (board, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_reuse() {
        let (pool1, _temp1) = create_test_pool().await;
        let (pool2, _temp2) = create_test_pool().await;

        let (board, _) = seed_board(&pool1).await;

        let in_first: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM boards")
            .fetch_one(&pool1)
            .await
            .expect("Pool 1 should work");
        let in_second: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM boards")
            .fetch_one(&pool2)
            .await
            .expect("Pool 2 should work");

        assert_eq!(in_first.0, 1);
        assert_eq!(in_second.0, 0);
        assert_eq!(board.name, "Test Board");
    }
}
