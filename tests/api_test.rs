use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use open_letters::config::Config;
use open_letters::feed::FeedService;
use open_letters::routes;
use open_letters::session::SESSION_HEADER;
use open_letters::state::AppState;
use open_letters::store::MemoryStore;

fn test_app() -> Router {
    let config = Config::default();
    let feed = FeedService::new(Arc::new(MemoryStore::new()), config.feed.clone());
    routes::app(AppState { feed, config })
}

fn seeded_app() -> Router {
    let config = Config::default();
    let feed = FeedService::new(Arc::new(MemoryStore::seeded()), config.feed.clone());
    routes::app(AppState { feed, config })
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, cookie, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(SESSION_HEADER, token)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn first_visit_mints_a_session_cookie() {
    let app = test_app();
    let (status, cookie, _) = send(&app, get("/api/posts")).await;
    assert_eq!(status, StatusCode::OK);

    let cookie = cookie.expect("a session cookie should be set");
    assert!(cookie.starts_with("letters_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
}

#[tokio::test]
async fn known_session_gets_no_new_cookie() {
    let app = test_app();
    let req = Request::get("/api/posts")
        .header(header::COOKIE, "letters_session=returning-visitor")
        .body(Body::empty())
        .unwrap();
    let (_, cookie, _) = send(&app, req).await;
    assert!(cookie.is_none());

    let req = Request::get("/api/posts")
        .header(SESSION_HEADER, "api-client")
        .body(Body::empty())
        .unwrap();
    let (_, cookie, _) = send(&app, req).await;
    assert!(cookie.is_none());
}

#[tokio::test]
async fn create_then_list() {
    let app = test_app();
    let (status, _, created) = send(
        &app,
        post_json("/api/posts", "writer", json!({"content": "Dear AI, hello."})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["content"], "Dear AI, hello.");
    assert_eq!(created["score"], 0);
    assert!(created.get("session_token").is_none());

    let (status, _, page) = send(&app, get("/api/posts?sort=newest&page=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["posts"].as_array().unwrap().len(), 1);
    assert_eq!(page["posts"][0]["id"], created["id"]);
    assert_eq!(page["page"], 1);
    assert_eq!(page["has_more"], false);
}

#[tokio::test]
async fn empty_letter_is_rejected() {
    let app = test_app();
    let (status, _, body) = send(
        &app,
        post_json("/api/posts", "writer", json!({"content": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn oversized_letter_is_rejected() {
    let app = test_app();
    let (status, _, _) = send(
        &app,
        post_json("/api/posts", "writer", json!({"content": "a".repeat(3001)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn page_zero_is_rejected() {
    let app = test_app();
    let (status, _, _) = send(&app, get("/api/posts?page=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_post_is_not_found() {
    let app = test_app();
    let (status, _, _) = send(&app, get("/api/posts/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(
        &app,
        post_json("/api/posts/missing/votes", "voter", json!({"direction": "up"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voting_follows_the_session() {
    let app = seeded_app();

    let (status, _, outcome) = send(
        &app,
        post_json("/api/posts/2/votes", "voter-a", json!({"direction": "up"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["score"], 1);
    assert_eq!(outcome["previous"], Value::Null);
    assert_eq!(outcome["vote"]["target"], json!({"kind": "post", "id": "2"}));

    // Same session again: nothing changes
    let (_, _, outcome) = send(
        &app,
        post_json("/api/posts/2/votes", "voter-a", json!({"direction": "up"})),
    )
    .await;
    assert_eq!(outcome["score"], 1);
    assert_eq!(outcome["previous"], "up");

    // Another session counts separately
    let (_, _, outcome) = send(
        &app,
        post_json("/api/posts/2/votes", "voter-b", json!({"direction": "up"})),
    )
    .await;
    assert_eq!(outcome["score"], 2);

    // Switching moves the score by two
    let (_, _, outcome) = send(
        &app,
        post_json("/api/posts/2/votes", "voter-a", json!({"direction": "down"})),
    )
    .await;
    assert_eq!(outcome["score"], 0);

    let (_, _, page) = send(&app, get("/api/posts?sort=top_rated")).await;
    let ids: Vec<&str> = page["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["3", "2", "1"]);
}

#[tokio::test]
async fn bad_direction_is_a_client_error() {
    let app = seeded_app();
    let (status, _, body) = send(
        &app,
        post_json("/api/posts/1/votes", "voter", json!({"direction": "sideways"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = seeded_app();

    let (status, _, body) = send(&app, post_json("/api/posts", "writer", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (status, _, body) = send(
        &app,
        post_json("/api/posts/1/comments", "writer", json!({"text": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (status, _, body) = send(&app, get("/api/posts?page=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let req = Request::post("/api/posts")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SESSION_HEADER, "writer")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn comments_round_trip() {
    let app = seeded_app();

    let (status, _, comment) = send(
        &app,
        post_json(
            "/api/posts/3/comments",
            "commenter",
            json!({"content": "Boring is relative."}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["authorship"], "human");
    assert_eq!(comment["post_id"], "3");

    let (status, _, comments) = send(&app, get("/api/posts/3/comments")).await;
    assert_eq!(status, StatusCode::OK);
    let comments = comments.as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["id"], "c3");
    assert_eq!(comments[1]["id"], comment["id"]);

    let uri = format!("/api/comments/{}/votes", comment["id"].as_str().unwrap());
    let (status, _, outcome) = send(
        &app,
        post_json(&uri, "reader", json!({"direction": "down"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["score"], -1);
    assert_eq!(outcome["vote"]["target"]["kind"], "comment");
}

#[tokio::test]
async fn comments_on_unknown_post() {
    let app = test_app();
    let (status, _, comments) = send(&app, get("/api/posts/nope/comments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comments, json!([]));

    let (status, _, _) = send(
        &app,
        post_json("/api/posts/nope/comments", "c", json!({"content": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_backend() {
    let app = test_app();
    let (status, _, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}
