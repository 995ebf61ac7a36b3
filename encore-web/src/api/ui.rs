//! Embedded SPA serving
//!
//! The two frontend assets are compiled into the binary. Unmatched `/api`
//! paths get a JSON 404; every other unmatched path falls back to the index
//! page so client-side routing works.

use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;

const INDEX_HTML: &str = include_str!("../ui/index.html");
const APP_JS: &str = include_str!("../ui/app.js");

/// GET /
pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /static/app.js
pub async fn serve_app_js() -> Response {
    (
        StatusCode::OK,
        [("content-type", "application/javascript")],
        APP_JS,
    )
        .into_response()
}

/// Fallback for unmatched routes
pub async fn spa_fallback(uri: Uri) -> Response {
    if uri.path().starts_with("/api/") || uri.path() == "/api" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "not_found"})),
        )
            .into_response();
    }

    Html(INDEX_HTML).into_response()
}
