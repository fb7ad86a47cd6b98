//! End-to-end tests driving the assembled router against an in-memory
//! SQLite database. No external moderation providers are configured, so
//! comments take the fail-open path: nsfw=false, spoiler left provisional.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use reado::config::Config;
use reado::db;
use reado::middleware::{
    admission::AdmissionController, metrics::RequestMetrics, timeout::RequestDeadline,
};
use reado::routes::comments::AppState;

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        max_concurrent_requests: 20,
        request_timeout_ms: 3000,
        perspective_api_key: None,
        openrouter_api_key: None,
        google_client_id: None,
        google_client_secret: None,
        oauth_redirect_uri: "http://localhost:5001/users/auth/google/callback".to_string(),
        frontend_reading_url: "http://localhost:3000/reading".to_string(),
        frontend_login_url: "http://localhost:3000/login".to_string(),
    }
}

// A single connection keeps every query on the same in-memory database.
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

async fn app_with(max_concurrent: usize, timeout_ms: u64) -> (Router, SqlitePool) {
    let pool = test_pool().await;
    let state = AppState {
        pool: pool.clone(),
        config: test_config(),
        http: reqwest::Client::new(),
        metrics: Arc::new(RequestMetrics::new()),
    };
    let router = reado::build_router(
        state,
        Arc::new(AdmissionController::new(max_concurrent)),
        RequestDeadline::from_millis(timeout_ms),
    );
    (router, pool)
}

async fn app() -> (Router, SqlitePool) {
    app_with(20, 3000).await
}

async fn seed_user(pool: &SqlitePool, google_id: &str, name: &str) -> String {
    db::users::upsert_google_user(
        pool,
        google_id,
        name,
        &format!("{google_id}@example.com"),
        "https://example.com/avatar.png",
        "oauth-access-token",
        None,
    )
    .await
    .unwrap()
    .id
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, json)
}

#[tokio::test]
async fn create_comment_returns_author_enriched_record() {
    let (app, pool) = app().await;
    let user_id = seed_user(&pool, "g-1", "Ada").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/comments",
        Some(json!({
            "bookId": "book-1",
            "userId": user_id,
            "page": 40,
            "percent": 12.5,
            "text": "Loving this chapter",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["bookId"], "book-1");
    assert_eq!(body["user"]["name"], "Ada");
    assert_eq!(body["nsfw"], false);
    assert_eq!(body["likes"], 0);
    // No classifier configured: provisional state, forever.
    assert_eq!(body["spoiler"]["isSpoiler"], false);
    assert_eq!(body["spoiler"]["source"], "none");
}

#[tokio::test]
async fn create_comment_validates_input() {
    let (app, pool) = app().await;
    let user_id = seed_user(&pool, "g-1", "Ada").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/comments",
        Some(json!({ "bookId": "", "userId": user_id, "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/comments",
        Some(json!({ "bookId": "book-1", "userId": "nobody", "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/comments",
        Some(json!({ "bookId": "book-1", "userId": user_id, "text": "hi", "percent": 150.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_marked_spoiler_is_authoritative() {
    let (app, pool) = app().await;
    let user_id = seed_user(&pool, "g-1", "Ada").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/comments",
        Some(json!({
            "bookId": "book-1",
            "userId": user_id,
            "text": "The butler did it",
            "userMarkedSpoiler": true,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["spoiler"]["isSpoiler"], true);
    assert_eq!(body["spoiler"]["source"], "user");

    // A classifier verdict arriving later must not overwrite the author.
    let id = body["id"].as_str().unwrap();
    let applied = db::comments::apply_spoiler_verdict(&pool, id, false, 0.99)
        .await
        .unwrap();
    assert!(!applied);

    let row = db::comments::get_comment(&pool, id).await.unwrap().unwrap();
    assert!(row.spoiler_is_spoiler);
    assert_eq!(row.spoiler_source, "user");
}

#[tokio::test]
async fn classifier_verdict_lands_on_unmarked_comment() {
    let (app, pool) = app().await;
    let user_id = seed_user(&pool, "g-1", "Ada").await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/comments",
        Some(json!({ "bookId": "book-1", "userId": user_id, "text": "He dies at the end" })),
    )
    .await;
    let id = body["id"].as_str().unwrap();

    let applied = db::comments::apply_spoiler_verdict(&pool, id, true, 0.85)
        .await
        .unwrap();
    assert!(applied);

    let row = db::comments::get_comment(&pool, id).await.unwrap().unwrap();
    assert!(row.spoiler_is_spoiler);
    assert_eq!(row.spoiler_source, "llm");
    assert_eq!(row.spoiler_confidence, Some(0.85));
}

#[tokio::test]
async fn list_comments_filters_and_sorts_newest_first() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let ben = seed_user(&pool, "g-2", "Ben").await;

    for (user, book, page, text) in [
        (&ada, "book-1", 10, "first"),
        (&ben, "book-1", 10, "second"),
        (&ada, "book-1", 20, "other page"),
        (&ada, "book-2", 10, "other book"),
    ] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/comments",
            Some(json!({ "bookId": book, "userId": user, "page": page, "text": text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, Method::GET, "/comments?bookId=book-1&page=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // Most recent first.
    assert_eq!(list[0]["text"], "second");
    assert_eq!(list[1]["text"], "first");

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/comments?bookId=book-1&userId={ada}"),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

async fn create_comment(app: &Router, user_id: &str) -> String {
    let (_, body) = send(
        app,
        Method::POST,
        "/comments",
        Some(json!({ "bookId": "book-1", "userId": user_id, "text": "hello" })),
    )
    .await;
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn like_toggles_off_on_second_call() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let ben = seed_user(&pool, "g-2", "Ben").await;
    let id = create_comment(&app, &ada).await;

    let uri = format!("/comments/{id}/like");
    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "userId": ben }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 1);
    assert_eq!(body["likedBy"], json!([ben]));

    let (_, body) = send(&app, Method::PATCH, &uri, Some(json!({ "userId": ben }))).await;
    assert_eq!(body["likes"], 0);
    assert_eq!(body["likedBy"], json!([]));
}

#[tokio::test]
async fn switching_polarity_moves_the_vote() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let ben = seed_user(&pool, "g-2", "Ben").await;
    let id = create_comment(&app, &ada).await;

    let (_, body) = send(
        &app,
        Method::PATCH,
        &format!("/comments/{id}/like"),
        Some(json!({ "userId": ben })),
    )
    .await;
    assert_eq!(body["likes"], 1);

    let (_, body) = send(
        &app,
        Method::PATCH,
        &format!("/comments/{id}/dislike"),
        Some(json!({ "userId": ben })),
    )
    .await;
    assert_eq!(body["likes"], 0);
    assert_eq!(body["dislikes"], 1);
    assert_eq!(body["likedBy"], json!([]));
    assert_eq!(body["dislikedBy"], json!([ben]));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/comments/{id}/vote-status?userId={ben}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasLiked"], false);
    assert_eq!(body["hasDisliked"], true);
}

#[tokio::test]
async fn vote_endpoints_reject_bad_input() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let id = create_comment(&app, &ada).await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/comments/{id}/like"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User ID is required");

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/comments/missing/like",
        Some(json!({ "userId": ada })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_reactions_keep_sets_mutually_exclusive() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let id = create_comment(&app, &ada).await;

    let mut voters = Vec::new();
    for i in 0..10 {
        voters.push(seed_user(&pool, &format!("voter-{i}"), &format!("Voter {i}")).await);
    }

    let mut handles = Vec::new();
    for voter in voters {
        let app = app.clone();
        let uri = format!("/comments/{id}/like");
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .method(Method::PATCH)
                .uri(&uri)
                .header("content-type", "application/json")
                .body(Body::from(json!({ "userId": voter }).to_string()))
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let row = db::comments::get_comment(&pool, &id).await.unwrap().unwrap();
    assert_eq!(row.likes, 10);
    let liked = row.liked_by_ids();
    assert_eq!(liked.len(), 10);
    assert!(row.disliked_by_ids().is_empty());
}

#[tokio::test]
async fn only_the_owner_can_delete() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let ben = seed_user(&pool, "g-2", "Ben").await;
    let id = create_comment(&app, &ada).await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/comments/{id}"),
        Some(json!({ "userId": ben })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You can only delete your own comments");
    assert!(db::comments::get_comment(&pool, &id).await.unwrap().is_some());

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/comments/{id}"),
        Some(json!({ "userId": ada })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(db::comments::get_comment(&pool, &id).await.unwrap().is_none());

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/comments/{id}"),
        Some(json!({ "userId": ada })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admission_ceiling_rejects_with_server_busy() {
    let (app, _pool) = app_with(0, 3000).await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "server busy");
}

#[tokio::test]
async fn requests_under_the_ceiling_are_admitted() {
    let (app, _pool) = app_with(1, 3000).await;

    for _ in 0..3 {
        let (status, _) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn health_reflects_database_connectivity() {
    let (app, pool) = app().await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db"], "connected");

    pool.close().await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["db"], "not connected");
}

#[tokio::test]
async fn metrics_snapshot_counts_completed_requests() {
    let (app, _pool) = app().await;

    for _ in 0..2 {
        let (status, _) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("requests_total 2"));
    assert!(text.contains("errors_total 0"));
}

#[tokio::test]
async fn google_auth_upserts_a_single_user() {
    let (app, _pool) = app().await;

    let payload = json!({
        "googleId": "g-42",
        "name": "Ada",
        "email": "ada@example.com",
        "picture": "https://example.com/a.png",
        "accessToken": "token-1",
    });
    let (status, body) = send(&app, Method::POST, "/users/auth/google", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let first_id = body["user"]["id"].as_str().unwrap().to_string();

    let (_, body) = send(
        &app,
        Method::POST,
        "/users/auth/google",
        Some(json!({
            "googleId": "g-42",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "picture": "https://example.com/a.png",
            "accessToken": "token-2",
        })),
    )
    .await;
    assert_eq!(body["user"]["id"], first_id.as_str());
    assert_eq!(body["user"]["name"], "Ada Lovelace");

    let (status, _) = send(
        &app,
        Method::POST,
        "/users/auth/google",
        Some(json!({ "googleId": "g-43" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_user_strips_secrets() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;

    let (status, body) = send(&app, Method::GET, &format!("/users/{ada}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada");
    assert!(body.get("accessToken").is_none());
    assert!(body.get("refreshToken").is_none());

    let (status, _) = send(&app, Method::GET, "/users/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_users_returns_public_profiles() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let ben = seed_user(&pool, "g-2", "Ben").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/users/batch",
        Some(json!({ "userIds": [ada, ben, "missing"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Method::POST, "/users/batch", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_bookmark_replaces_and_moves_to_the_end() {
    let (app, pool) = app().await;
    let ada = seed_user(&pool, "g-1", "Ada").await;
    let uri = format!("/users/{ada}/bookmarks");

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "bookId": "book-1", "page": 10, "color": "red" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "bookId": "book-1", "page": 20, "color": "blue" })),
    )
    .await;

    // Same (book, page): replaced, not appended twice.
    let (_, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "bookId": "book-1", "page": 10, "color": "green" })),
    )
    .await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["page"], 20);
    assert_eq!(list[1]["page"], 10);
    assert_eq!(list[1]["color"], "green");

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "bookId": "book-1", "page": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/users/missing/bookmarks", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
