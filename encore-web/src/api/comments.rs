//! Comment endpoints
//!
//! Creation and deletion require a local account. Free text is stripped of
//! markup before validation, and each user owns at most a fixed number of
//! comments at a time.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use encore_common::db::models::CommentView;
use encore_common::db::queries;

use crate::api::ApiError;
use crate::session::{SessionLookup, SessionUser};
use crate::AppState;

const TITLE_MAX: usize = 128;
const BODY_MAX: usize = 4000;
/// Maximum concurrent comments per user
const MAX_COMMENTS_PER_USER: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub title: String,
    pub body: String,
}

/// GET /api/comments
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<CommentView>>, ApiError> {
    Ok(Json(queries::list_comments(&state.db).await?))
}

/// POST /api/comments
pub async fn create(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = require_user(&state, &jar, &headers).await?;

    let title = sanitize_text(&req.title);
    let body = sanitize_text(&req.body);

    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if title.chars().count() > TITLE_MAX {
        return Err(ApiError::BadRequest(format!("title exceeds {} characters", TITLE_MAX)));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("body must not be empty".to_string()));
    }
    if body.chars().count() > BODY_MAX {
        return Err(ApiError::BadRequest(format!("body exceeds {} characters", BODY_MAX)));
    }

    if queries::count_comments_for_user(&state.db, user.id).await? >= MAX_COMMENTS_PER_USER {
        return Err(ApiError::Forbidden("comment_limit"));
    }

    let comment = queries::insert_comment(&state.db, user.id, &title, &body).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "comment": comment})),
    ))
}

/// DELETE /api/comments/:id
///
/// Owner-only: 404 for unknown ids, 403 for someone else's comment.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = require_user(&state, &jar, &headers).await?;

    let comment = queries::get_comment(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("comment_not_found"))?;

    if comment.user_id != user.id {
        return Err(ApiError::Forbidden("not_owner"));
    }

    queries::delete_comment(&state.db, id).await?;
    Ok(Json(json!({"success": true})))
}

/// Resolve the session and demand a local account
async fn require_user(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<SessionUser, ApiError> {
    match state.sessions.resolve(jar, headers).await {
        SessionLookup::Expired => Err(ApiError::SessionExpired),
        SessionLookup::Valid(_, session) => session.user.ok_or(ApiError::NotAuthenticated),
        SessionLookup::Anonymous => Err(ApiError::NotAuthenticated),
    }
}

/// Strip everything that looks like markup (`<...>` spans, including an
/// unterminated trailing `<`), then trim surrounding whitespace.
fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    out.trim().to_string()
}
