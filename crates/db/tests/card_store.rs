//! Integration tests for the column-scoped card queries.
//!
//! These cover the primitives the position ledger composes:
//! - `Card::shift_range()` with bounded and unbounded ranges
//! - `Card::set_placement()` / `Card::column()` ordering
//! - cascading deletes from boards down to checklist items and comments

use std::str::FromStr;

use db::models::{
    board::{Board, CreateBoard},
    card::{Card, CardContentUpdate, CardStatus, NewCard, Priority},
    card_comment::CardComment,
    checklist_item::ChecklistItem,
    team::Team,
    team_member::{TeamMember, TeamRole},
};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use tempfile::TempDir;
use uuid::Uuid;

async fn setup_test_pool() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");

    let options =
        SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.to_string_lossy()))
            .expect("Invalid database URL")
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to create pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, temp_dir)
}

async fn create_test_board(pool: &SqlitePool) -> (Board, Uuid) {
    let team = Team::create(pool, "Platform").await.expect("team");
    let user_id = Uuid::new_v4();
    TeamMember::add(pool, team.id, user_id, TeamRole::Owner)
        .await
        .expect("member");
    let board = Board::create(
        pool,
        &CreateBoard {
            team_id: team.id,
            name: "Sprint".to_string(),
            description: Some("two weeks".to_string()),
        },
        user_id,
    )
    .await
    .expect("Failed to create test board");
    (board, user_id)
}

/// Inserts a card at the end of the column, the way the ledger would.
async fn append_card(pool: &SqlitePool, board: &Board, user_id: Uuid, title: &str, status: CardStatus) -> Card {
    let position = Card::column_len(pool, board.id, status).await.expect("len");
    let data = NewCard {
        board_id: board.id,
        title: title.to_string(),
        description: None,
        status,
        priority: Priority::default(),
        assignee_id: None,
        due_date: None,
        created_by: user_id,
    };
    Card::insert(pool, Uuid::new_v4(), &data, position)
        .await
        .expect("Failed to insert card")
}

async fn titles_in(pool: &SqlitePool, board: &Board, status: CardStatus) -> Vec<String> {
    let slots = Card::column(pool, board.id, status).await.expect("column");
    let mut titles = Vec::new();
    for slot in slots {
        let card = Card::find_by_id(pool, slot.id).await.unwrap().unwrap();
        titles.push(card.title);
    }
    titles
}

// ============================================================================
// Column queries
// ============================================================================

#[tokio::test]
async fn test_append_assigns_dense_positions() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let (board, user_id) = create_test_board(&pool).await;

    let a = append_card(&pool, &board, user_id, "A", CardStatus::Todo).await;
    let b = append_card(&pool, &board, user_id, "B", CardStatus::Todo).await;
    let c = append_card(&pool, &board, user_id, "C", CardStatus::Done).await;

    assert_eq!((a.position, b.position, c.position), (0, 1, 0));
    assert_eq!(a.priority, Priority::Medium);
    assert_eq!(Card::column_len(&pool, board.id, CardStatus::Todo).await.unwrap(), 2);
    assert_eq!(Card::column_len(&pool, board.id, CardStatus::InProgress).await.unwrap(), 0);
}

#[tokio::test]
async fn test_shift_range_respects_bounds_and_column() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let (board, user_id) = create_test_board(&pool).await;

    for title in ["A", "B", "C", "D"] {
        append_card(&pool, &board, user_id, title, CardStatus::Todo).await;
    }
    let done = append_card(&pool, &board, user_id, "X", CardStatus::Done).await;

    // Bounded: [1, 3) moves B and C down by one.
    let shifted = Card::shift_range(&pool, board.id, CardStatus::Todo, 1, Some(3), 1)
        .await
        .unwrap();
    assert_eq!(shifted, 2);

    let positions: Vec<i64> = Card::column(&pool, board.id, CardStatus::Todo)
        .await
        .unwrap()
        .iter()
        .map(|s| s.position)
        .collect();
    assert_eq!(positions, vec![0, 2, 3, 3]);

    // Unbounded shifts only touch the named column.
    Card::shift_range(&pool, board.id, CardStatus::Todo, 0, None, 5)
        .await
        .unwrap();
    let untouched = Card::find_by_id(&pool, done.id).await.unwrap().unwrap();
    assert_eq!(untouched.position, 0);
}

#[tokio::test]
async fn test_set_placement_and_board_ordering() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let (board, user_id) = create_test_board(&pool).await;

    let a = append_card(&pool, &board, user_id, "A", CardStatus::Todo).await;
    append_card(&pool, &board, user_id, "B", CardStatus::InProgress).await;
    append_card(&pool, &board, user_id, "C", CardStatus::Done).await;

    Card::set_placement(&pool, a.id, CardStatus::Done, 1).await.unwrap();

    let all: Vec<(CardStatus, String)> = Card::find_by_board(&pool, board.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| (c.status, c.title))
        .collect();
    assert_eq!(
        all,
        vec![
            (CardStatus::InProgress, "B".to_string()),
            (CardStatus::Done, "C".to_string()),
            (CardStatus::Done, "A".to_string()),
        ]
    );
    assert_eq!(titles_in(&pool, &board, CardStatus::Done).await, vec!["C", "A"]);
}

#[tokio::test]
async fn test_find_in_board_rejects_foreign_card() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let (board, user_id) = create_test_board(&pool).await;
    let (other_board, other_user) = create_test_board(&pool).await;

    let card = append_card(&pool, &other_board, other_user, "elsewhere", CardStatus::Todo).await;
    let _ = append_card(&pool, &board, user_id, "here", CardStatus::Todo).await;

    assert!(Card::find_in_board(&pool, board.id, card.id).await.unwrap().is_none());
    assert!(Card::find_in_board(&pool, other_board.id, card.id).await.unwrap().is_some());
}

// ============================================================================
// Content updates
// ============================================================================

#[tokio::test]
async fn test_update_content_keeps_unset_fields_and_placement() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let (board, user_id) = create_test_board(&pool).await;

    append_card(&pool, &board, user_id, "first", CardStatus::Todo).await;
    let card = append_card(&pool, &board, user_id, "second", CardStatus::Todo).await;

    let update = CardContentUpdate {
        title: Some("renamed".to_string()),
        priority: Some(Priority::Urgent),
        ..Default::default()
    };
    let updated = Card::update_content(&pool, card.id, &update)
        .await
        .unwrap()
        .expect("card exists");

    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.priority, Priority::Urgent);
    assert_eq!(updated.description, None);
    assert_eq!(updated.status, CardStatus::Todo);
    assert_eq!(updated.position, 1);

    let missing = Card::update_content(&pool, Uuid::new_v4(), &update).await.unwrap();
    assert!(missing.is_none());
}

// ============================================================================
// Cascades
// ============================================================================

#[tokio::test]
async fn test_board_delete_cascades_to_children() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let (board, user_id) = create_test_board(&pool).await;

    let card = append_card(&pool, &board, user_id, "A", CardStatus::Todo).await;
    ChecklistItem::insert(&pool, card.id, "write tests", 0).await.unwrap();
    CardComment::create(&pool, card.id, user_id, "looks good").await.unwrap();
    CardComment::create(&pool, card.id, user_id, "merged").await.unwrap();
    assert_eq!(CardComment::count(&pool, card.id).await.unwrap(), 2);

    assert_eq!(Board::delete(&pool, board.id).await.unwrap(), 1);

    let remaining: (i64, i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM cards), (SELECT COUNT(*) FROM checklist_items), (SELECT COUNT(*) FROM card_comments)",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(remaining, (0, 0, 0));
    assert_eq!(CardComment::count(&pool, card.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_board_lists_for_member_and_team() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let (board, user_id) = create_test_board(&pool).await;
    append_card(&pool, &board, user_id, "A", CardStatus::Todo).await;
    append_card(&pool, &board, user_id, "B", CardStatus::Done).await;

    let mine = Board::find_for_member(&pool, user_id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].board.id, board.id);
    assert_eq!(mine[0].card_count, 2);

    let stranger = Board::find_for_member(&pool, Uuid::new_v4()).await.unwrap();
    assert!(stranger.is_empty());

    let team_boards = Board::find_by_team(&pool, board.team_id).await.unwrap();
    assert_eq!(team_boards.len(), 1);
}
