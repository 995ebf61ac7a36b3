//! Integration tests for the encore-web API
//!
//! Tests cover:
//! - Health endpoint and cache reporting
//! - Local account registration/login/logout, per-IP signup cap
//! - Comments CRUD with sanitization, length and per-user limits
//! - SPA fallback vs JSON 404 for unknown /api routes
//!
//! Everything here runs against a temp root folder and a temp SQLite file;
//! no test touches the network (provider-backed routes are covered at unit
//! level in the spotify module).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use encore_common::config::Settings;
use encore_common::db::init_database;
use encore_web::spotify::Artist;
use encore_web::{build_router, AppState};

/// Test helper: fresh app over a temp root + temp database
async fn setup() -> (axum::Router, AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("encore.db")).await.unwrap();
    let state = AppState::new(pool, Arc::new(Settings::default()), dir.path()).unwrap();
    (build_router(state.clone()), state, dir)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value, cookie: Option<&str>, ip: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(ip) = ip {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn delete(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Test helper: extract JSON body from a response
async fn extract_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    serde_json::from_slice(&bytes).expect("should parse JSON")
}

/// Test helper: pull `encore_session=<id>` out of Set-Cookie
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(|s| s.to_string())
}

/// Test helper: register a user and return their session cookie
async fn register(app: &axum::Router, username: &str, ip: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            &json!({"username": username, "password": "hunter2hunter2"}),
            None,
            Some(ip),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "registration should succeed");
    session_cookie(&response).expect("registration should set a session cookie")
}

fn sample_artist(id: &str) -> Artist {
    Artist {
        id: id.to_string(),
        name: format!("Artist {}", id),
        genres: vec!["rock".to_string()],
        popularity: 70,
        followers: 1000,
        images: vec![],
        spotify_url: format!("https://open.spotify.com/artist/{}", id),
    }
}

// =============================================================================
// Health endpoint
// =============================================================================

#[tokio::test]
async fn test_health_reports_empty_cache() {
    let (app, _state, _dir) = setup().await;

    let response = app.oneshot(get("/api/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"]["status"], "empty");
    assert!(body["cache"]["ageSeconds"].is_null());
}

#[tokio::test]
async fn test_health_reports_cached_artists() {
    let (app, state, _dir) = setup().await;

    state
        .artist_cache
        .write(&vec![sample_artist("a1"), sample_artist("a2")])
        .await;

    let body = extract_json(app.oneshot(get("/api/health", None)).await.unwrap()).await;
    assert_eq!(body["cache"]["status"], "ok");
    assert_eq!(body["cache"]["artistCount"], 2);
    assert!(body["cache"]["ageSeconds"].as_i64().unwrap() < 5);
    assert!(body["cache"]["fileSizeKB"].is_u64());
}

// =============================================================================
// Artists (cache-served path; provider-backed paths are unit-tested)
// =============================================================================

#[tokio::test]
async fn test_artists_are_served_from_a_valid_cache_without_a_fetch() {
    let (app, state, _dir) = setup().await;

    state
        .artist_cache
        .write(&vec![sample_artist("a1"), sample_artist("a2")])
        .await;

    let response = app.oneshot(get("/api/artists", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["source"], "global");
    assert_eq!(body["cached"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["artists"][0]["name"], "Artist a1");
    assert!(body["timestamp"].is_i64());
}

// =============================================================================
// Local accounts
// =============================================================================

#[tokio::test]
async fn test_register_then_me_reports_authenticated() {
    let (app, _state, _dir) = setup().await;
    let cookie = register(&app, "alice", "10.0.0.1").await;

    let body = extract_json(
        app.oneshot(get("/api/auth/me", Some(&cookie))).await.unwrap(),
    )
    .await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_register_validates_input() {
    let (app, _state, _dir) = setup().await;

    // Too-short username
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            &json!({"username": "ab", "password": "hunter2hunter2"}),
            None,
            Some("10.0.0.1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Too-short password
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            &json!({"username": "alice", "password": "short"}),
            None,
            Some("10.0.0.1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Invalid characters
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            &json!({"username": "not ok!", "password": "hunter2hunter2"}),
            None,
            Some("10.0.0.1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let (app, _state, _dir) = setup().await;
    register(&app, "alice", "10.0.0.1").await;

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            &json!({"username": "alice", "password": "hunter2hunter2"}),
            None,
            Some("10.0.0.2"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(extract_json(response).await["error"], "username_taken");
}

#[tokio::test]
async fn test_fourth_account_from_same_ip_is_rejected() {
    let (app, _state, _dir) = setup().await;

    for name in ["user_one", "user_two", "user_three"] {
        register(&app, name, "203.0.113.9").await;
    }

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            &json!({"username": "user_four", "password": "hunter2hunter2"}),
            None,
            Some("203.0.113.9"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(extract_json(response).await["error"], "ip_limit");
}

#[tokio::test]
async fn test_spoofed_forwarded_header_cannot_lift_ip_cap() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("encore.db")).await.unwrap();
    let settings = Settings { trust_proxy: false, ..Settings::default() };
    let state = AppState::new(pool, Arc::new(settings), dir.path()).unwrap();
    let app = build_router(state);

    // Without a trusted proxy every request here resolves to the same
    // (unknown) peer, so distinct forwarded addresses must not matter
    for (name, ip) in [("user_one", "1.1.1.1"), ("user_two", "2.2.2.2"), ("user_three", "3.3.3.3")]
    {
        register(&app, name, ip).await;
    }

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            &json!({"username": "user_four", "password": "hunter2hunter2"}),
            None,
            Some("4.4.4.4"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(extract_json(response).await["error"], "ip_limit");
}

#[tokio::test]
async fn test_login_round_trip() {
    let (app, _state, _dir) = setup().await;
    register(&app, "alice", "10.0.0.1").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            &json!({"username": "alice", "password": "hunter2hunter2"}),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).unwrap();

    let body = extract_json(
        app.oneshot(get("/api/auth/me", Some(&cookie))).await.unwrap(),
    )
    .await;
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn test_logout_clears_local_auth_only() {
    let (app, state, _dir) = setup().await;
    let cookie = register(&app, "alice", "10.0.0.1").await;

    // Give the same session an (independent) Spotify authorization
    let session_id = uuid::Uuid::parse_str(cookie.split('=').nth(1).unwrap()).unwrap();
    state
        .sessions
        .update(&session_id, |s| {
            s.spotify = Some(encore_web::spotify::TokenBundle {
                access_token: "access".into(),
                refresh_token: "refresh".into(),
                expires_at: chrono::Utc::now().timestamp() + 3600,
            })
        })
        .await;

    let response = app
        .clone()
        .oneshot(post_json("/api/auth/logout", &json!({}), Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(
        app.clone()
            .oneshot(get("/api/auth/me", Some(&cookie)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["authenticated"], false);

    // Spotify track must survive the local logout
    let body = extract_json(
        app.oneshot(get("/api/auth/spotify/status", Some(&cookie)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["authenticated"], true);
}

// =============================================================================
// Comments
// =============================================================================

#[tokio::test]
async fn test_unauthenticated_comment_is_rejected_and_creates_nothing() {
    let (app, _state, _dir) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/comments",
            &json!({"title": "hi", "body": "there"}),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(extract_json(response).await["error"], "not_authenticated");

    let all = extract_json(app.oneshot(get("/api/comments", None)).await.unwrap()).await;
    assert_eq!(all.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_comment_creation_sanitizes_and_lists_with_author() {
    let (app, _state, _dir) = setup().await;
    let cookie = register(&app, "alice", "10.0.0.1").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/comments",
            &json!({"title": "<b>Great</b> show", "body": "Saw them <i>live</i>!"}),
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let all = extract_json(app.oneshot(get("/api/comments", None)).await.unwrap()).await;
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["title"], "Great show");
    assert_eq!(all[0]["body"], "Saw them live!");
    assert_eq!(all[0]["username"], "alice");
}

#[tokio::test]
async fn test_comment_validation_rejects_bad_fields() {
    let (app, _state, _dir) = setup().await;
    let cookie = register(&app, "alice", "10.0.0.1").await;

    // Empty after markup stripping
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/comments",
            &json!({"title": "<p> </p>", "body": "fine"}),
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Over-long title
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/comments",
            &json!({"title": "t".repeat(129), "body": "fine"}),
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Over-long body
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/comments",
            &json!({"title": "ok", "body": "b".repeat(4001)}),
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sixth_comment_is_rejected() {
    let (app, _state, _dir) = setup().await;
    let cookie = register(&app, "alice", "10.0.0.1").await;

    for i in 0..5 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/comments",
                &json!({"title": format!("comment {}", i), "body": "text"}),
                Some(&cookie),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(post_json(
            "/api/comments",
            &json!({"title": "one too many", "body": "text"}),
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(extract_json(response).await["error"], "comment_limit");
}

#[tokio::test]
async fn test_comment_deletion_is_owner_only() {
    let (app, _state, _dir) = setup().await;
    let alice = register(&app, "alice", "10.0.0.1").await;
    let bob = register(&app, "bob", "10.0.0.2").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/comments",
            &json!({"title": "mine", "body": "hands off"}),
            Some(&alice),
            None,
        ))
        .await
        .unwrap();
    let id = extract_json(response).await["comment"]["id"].as_i64().unwrap();

    // Unknown id
    let response = app
        .clone()
        .oneshot(delete("/api/comments/999", Some(&alice)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Someone else's comment: 403, row intact
    let response = app
        .clone()
        .oneshot(delete(&format!("/api/comments/{}", id), Some(&bob)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(extract_json(response).await["error"], "not_owner");

    let all = extract_json(app.clone().oneshot(get("/api/comments", None)).await.unwrap()).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    // Owner: 200, row gone
    let response = app
        .clone()
        .oneshot(delete(&format!("/api/comments/{}", id), Some(&alice)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let all = extract_json(app.oneshot(get("/api/comments", None)).await.unwrap()).await;
    assert_eq!(all.as_array().unwrap().len(), 0);
}

// =============================================================================
// SPA fallback
// =============================================================================

#[tokio::test]
async fn test_unknown_api_route_is_json_404() {
    let (app, _state, _dir) = setup().await;

    let response = app.oneshot(get("/api/nope", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(extract_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_unknown_route_serves_spa_index() {
    let (app, _state, _dir) = setup().await;

    let response = app.oneshot(get("/some/client/route", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("<!DOCTYPE html>"));
}

#[tokio::test]
async fn test_index_and_app_js_are_served() {
    let (app, _state, _dir) = setup().await;

    let response = app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/static/app.js", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/javascript"
    );
}
