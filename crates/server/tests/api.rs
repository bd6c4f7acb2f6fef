//! End-to-end tests of the REST surface against a temp SQLite database.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use db::{
    DBService, RetryConfig,
    models::team_member::{TeamMember, TeamRole},
    test_utils::{create_test_pool, seed_board},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use server::{AppState, auth::JwtService, routes};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api-test-secret";

struct TestApp {
    app: Router,
    pool: SqlitePool,
    jwt: JwtService,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let (pool, dir) = create_test_pool().await;
        let jwt = JwtService::new(SecretString::from(SECRET.to_string()));
        let state = AppState::new(
            DBService::from_pool(pool.clone()),
            jwt.clone(),
            RetryConfig::default(),
        );
        Self {
            app: routes::router(state),
            pool,
            jwt,
            _dir: dir,
        }
    }

    fn token(&self, user_id: Uuid) -> String {
        self.jwt.issue_access_token(user_id).unwrap()
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token(user_id)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;

    let (status, body) = app.request("GET", "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database_ready"], true);
}

#[tokio::test]
async fn test_kanban_routes_require_a_valid_token() {
    let app = TestApp::new().await;

    let (status, _) = app.request("GET", "/api/kanban/boards/my", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = JwtService::new(SecretString::from("other".to_string()))
        .issue_access_token(Uuid::new_v4())
        .unwrap();
    let request = Request::builder()
        .uri("/api/kanban/boards/my")
        .header(header::AUTHORIZATION, format!("Bearer {forged}"))
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_board_and_card_flow() {
    let app = TestApp::new().await;
    let (board, owner) = seed_board(&app.pool).await;
    let cards_uri = format!("/api/kanban/boards/{}/cards", board.id);

    let mut ids = Vec::new();
    for title in ["A", "B", "C", "D"] {
        let (status, body) = app
            .request("POST", &cards_uri, Some(owner), Some(json!({ "title": title })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    // B from position 1 to 3.
    let (status, body) = app
        .request(
            "PATCH",
            &format!("{cards_uri}/{}/move", ids[1]),
            Some(owner),
            Some(json!({ "status": "todo", "position": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["position"], 3);
    assert_eq!(body["data"]["status"], "TODO");

    let (status, body) = app
        .request(
            "GET",
            &format!("/api/kanban/boards/{}", board.id),
            Some(owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order: Vec<(String, i64)> = body["data"]["cards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["title"].as_str().unwrap().to_string(),
                c["position"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("A".to_string(), 0),
            ("C".to_string(), 1),
            ("D".to_string(), 2),
            ("B".to_string(), 3),
        ]
    );

    let (status, _) = app
        .request("DELETE", &format!("{cards_uri}/{}", ids[0]), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .request("GET", &format!("{cards_uri}/{}", ids[2]), Some(owner), None)
        .await;
    assert_eq!(body["data"]["position"], 0);
}

#[tokio::test]
async fn test_error_statuses() {
    let app = TestApp::new().await;
    let (board, owner) = seed_board(&app.pool).await;
    let cards_uri = format!("/api/kanban/boards/{}/cards", board.id);

    let (status, body) = app
        .request(
            "POST",
            &cards_uri,
            Some(owner),
            Some(json!({ "title": "x", "status": "blocked" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("blocked"));

    let (status, _) = app
        .request(
            "POST",
            &cards_uri,
            Some(Uuid::new_v4()),
            Some(json!({ "title": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            "GET",
            &format!("/api/kanban/boards/{}", Uuid::new_v4()),
            Some(owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_board_lifecycle_and_roles() {
    let app = TestApp::new().await;
    let (board, owner) = seed_board(&app.pool).await;
    let member = Uuid::new_v4();
    TeamMember::add(&app.pool, board.team_id, member, TeamRole::Member)
        .await
        .unwrap();

    let (status, body) = app
        .request(
            "POST",
            "/api/kanban/boards",
            Some(member),
            Some(json!({ "team_id": board.team_id, "name": "Second" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let second = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .request(
            "GET",
            &format!("/api/kanban/teams/{}/boards", board.team_id),
            Some(member),
            None,
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/api/kanban/boards/{second}"),
            Some(member),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/api/kanban/boards/{second}"),
            Some(owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .request("GET", "/api/kanban/boards/my", Some(member), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checklist_and_comments() {
    let app = TestApp::new().await;
    let (board, owner) = seed_board(&app.pool).await;
    let (_, body) = app
        .request(
            "POST",
            &format!("/api/kanban/boards/{}/cards", board.id),
            Some(owner),
            Some(json!({ "title": "Release" })),
        )
        .await;
    let card_uri = format!(
        "/api/kanban/boards/{}/cards/{}",
        board.id,
        body["data"]["id"].as_str().unwrap()
    );

    for text in ["build", "tag"] {
        let (status, _) = app
            .request(
                "POST",
                &format!("{card_uri}/checklist"),
                Some(owner),
                Some(json!({ "text": text })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app.request("GET", &card_uri, Some(owner), None).await;
    let first = body["data"]["checklist"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            "PATCH",
            &format!("{card_uri}/checklist/{first}/toggle"),
            Some(owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checklist"][0]["completed"], true);

    let (_, body) = app
        .request(
            "DELETE",
            &format!("{card_uri}/checklist/{first}"),
            Some(owner),
            None,
        )
        .await;
    assert_eq!(body["data"]["checklist"][0]["text"], "tag");
    assert_eq!(body["data"]["checklist"][0]["position"], 0);

    let (status, _) = app
        .request(
            "POST",
            &format!("{card_uri}/comments"),
            Some(owner),
            Some(json!({ "content": "ship it" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app
        .request("GET", &format!("{card_uri}/comments"), Some(owner), None)
        .await;
    assert_eq!(body["data"][0]["content"], "ship it");
}
