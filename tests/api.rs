//! End-to-end tests of the HTTP surface against the SQLite backend.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use social_feed::{
    config::Backend,
    domain::MediaStorage,
    errors::StorageError,
    models::UploadUrls,
    repositories::SqlPostRepository,
    routes::create_router,
    AppState,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::Arc;
use tower::ServiceExt;

const ORIGIN: &str = "https://stenoip.github.io";

struct StubMediaStorage;

#[async_trait]
impl MediaStorage for StubMediaStorage {
    async fn create_upload_url(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadUrls, StorageError> {
        Ok(UploadUrls {
            upload_url: format!("https://upload.test/{}?type={}", filename, content_type),
            blob_url: format!("https://cdn.test/media/{}", filename),
        })
    }
}

async fn test_app(feed_limit: usize) -> (Router, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let repo = SqlPostRepository::new(pool.clone());
    repo.init_schema().await.unwrap();

    let state = Arc::new(AppState {
        post_repo: Arc::new(repo),
        media_storage: Arc::new(StubMediaStorage),
        backend: Backend::Sql,
        feed_limit,
    });
    (create_router(state, HeaderValue::from_static(ORIGIN)), pool)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn submit(app: &Router, body: Value) -> Value {
    let (status, json) = send(app, Method::POST, "/api/submit", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "submit failed: {}", json);
    json["post"].clone()
}

async fn feed(app: &Router) -> Vec<Value> {
    let (status, json) = send(app, Method::GET, "/api/feed", None).await;
    assert_eq!(status, StatusCode::OK);
    json["posts"].as_array().unwrap().clone()
}

fn media(caption: &str) -> Value {
    json!({ "mediaUrl": "https://x/y.png", "mediaType": "image/png", "caption": caption })
}

#[tokio::test]
async fn submit_applies_defaults() {
    let (app, _) = test_app(50).await;

    let post = submit(&app, json!({ "mediaUrl": "https://x/y.png", "mediaType": "image/png" })).await;

    assert!(post["id"].as_str().is_some());
    assert_eq!(post["author"], "guest");
    assert_eq!(post["caption"], "");
    assert_eq!(post["media_url"], "https://x/y.png");
    assert_eq!(post["media_type"], "image/png");
    assert_eq!(post["likes_count"], 0);
    assert_eq!(post["comments"], json!([]));
}

#[tokio::test]
async fn submit_without_media_is_rejected_and_not_stored() {
    let (app, _) = test_app(50).await;

    for body in [
        json!({ "mediaType": "image/png" }),
        json!({ "mediaUrl": "https://x/y.png" }),
        json!({ "mediaUrl": "", "mediaType": "image/png" }),
        json!({}),
    ] {
        let (status, json) = send(&app, Method::POST, "/api/submit", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "media required");
    }

    assert!(feed(&app).await.is_empty());
}

#[tokio::test]
async fn submitted_post_is_visible_in_feed() {
    let (app, _) = test_app(50).await;
    let post = submit(&app, media("first")).await;

    let posts = feed(&app).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], post["id"]);
    assert_eq!(posts[0]["likes_count"], 0);
    assert_eq!(posts[0]["comments"], json!([]));
}

#[tokio::test]
async fn long_fields_are_truncated_not_rejected() {
    let (app, _) = test_app(50).await;

    let post = submit(
        &app,
        json!({
            "author": "a".repeat(100),
            "caption": "c".repeat(1000),
            "mediaUrl": "https://x/y.png",
            "mediaType": "image/png",
        }),
    )
    .await;
    assert_eq!(post["author"].as_str().unwrap().len(), 64);
    assert_eq!(post["caption"].as_str().unwrap().len(), 280);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/comment",
        Some(json!({ "postId": post["id"], "author": "b".repeat(80), "text": "t".repeat(900) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let posts = feed(&app).await;
    let comment = &posts[0]["comments"][0];
    assert_eq!(comment["author"].as_str().unwrap().len(), 64);
    assert_eq!(comment["text"].as_str().unwrap().len(), 500);
}

#[tokio::test]
async fn liking_twice_stores_one_like() {
    let (app, pool) = test_app(50).await;
    let post = submit(&app, media("liked")).await;
    let body = json!({ "postId": post["id"], "sessionId": "session-1" });

    for _ in 0..2 {
        let (status, json) = send(&app, Method::POST, "/api/like", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "ok": true }));
    }

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(feed(&app).await[0]["likes_count"], 1);
}

#[tokio::test]
async fn like_requires_post_and_session() {
    let (app, _) = test_app(50).await;

    let (status, json) = send(&app, Method::POST, "/api/like", Some(json!({ "postId": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing");

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/like",
        Some(json!({ "postId": "not-a-uuid", "sessionId": "s" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid postId");
}

#[tokio::test]
async fn feed_is_newest_first_and_stable() {
    let (app, _) = test_app(50).await;
    let first = submit(&app, media("one")).await;
    let second = submit(&app, media("two")).await;
    let third = submit(&app, media("three")).await;

    let ids = |posts: Vec<Value>| posts.into_iter().map(|p| p["id"].clone()).collect::<Vec<_>>();
    let expected = vec![third["id"].clone(), second["id"].clone(), first["id"].clone()];

    assert_eq!(ids(feed(&app).await), expected);
    assert_eq!(ids(feed(&app).await), expected);
}

#[tokio::test]
async fn feed_respects_configured_limit() {
    let (app, _) = test_app(2).await;
    for caption in ["a", "b", "c"] {
        submit(&app, media(caption)).await;
    }

    let posts = feed(&app).await;
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["caption"], "c");
    assert_eq!(posts[1]["caption"], "b");
}

#[tokio::test]
async fn comments_are_listed_oldest_first() {
    let (app, _) = test_app(50).await;
    let post = submit(&app, media("talk")).await;

    for text in ["first", "second"] {
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/comment",
            Some(json!({ "postId": post["id"], "author": "bo", "text": text })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "ok": true }));
    }

    let posts = feed(&app).await;
    let texts: Vec<&str> = posts[0]["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(posts[0]["comments"][0]["post_id"], post["id"]);
}

#[tokio::test]
async fn comment_on_unknown_post_keeps_orphan_row() {
    let (app, pool) = test_app(50).await;
    let missing = uuid::Uuid::new_v4().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/comment",
        Some(json!({ "postId": missing, "author": "bo", "text": "hello?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
        .bind(&missing)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn comment_requires_every_field() {
    let (app, _) = test_app(50).await;
    let post = submit(&app, media("x")).await;

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/comment",
        Some(json!({ "postId": post["id"], "author": "bo" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing");
}

#[tokio::test]
async fn upload_url_is_issued() {
    let (app, _) = test_app(50).await;

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/create-upload-url",
        Some(json!({ "filename": "cat.png", "contentType": "image/png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["uploadUrl"], "https://upload.test/cat.png?type=image/png");
    assert_eq!(json["blobUrl"], "https://cdn.test/media/cat.png");

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/create-upload-url",
        Some(json!({ "filename": "cat.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "filename and contentType required");
}

#[tokio::test]
async fn wrong_methods_are_rejected() {
    let (app, _) = test_app(50).await;

    let (status, _) = send(&app, Method::PUT, "/api/submit", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, Method::GET, "/api/like", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, json) = send(&app, Method::POST, "/api/feed", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"], "Method Not Allowed");
}

#[tokio::test]
async fn preflight_returns_cors_headers() {
    let (app, _) = test_app(50).await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/submit")
        .header(header::ORIGIN, ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        HeaderValue::from_static(ORIGIN)
    );
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn malformed_json_and_unknown_routes() {
    let (app, _) = test_app(50).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, Method::GET, "/api/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Not Found");
}

#[tokio::test]
async fn health_reports_backend() {
    let (app, _) = test_app(50).await;
    let (status, json) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "status": "ok", "backend": "sql" }));
}
