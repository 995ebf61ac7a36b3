//! API error taxonomy
//!
//! Upstream provider failures surface as a generic 500 (detail is logged
//! server-side only). Validation failures carry a specific reason. Auth
//! failures distinguish "never authenticated" from "session expired or
//! invalidated" via the machine-readable `error` code.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::session::{clear_session_cookie, SessionExpired};
use crate::spotify::SpotifyError;

/// Error type returned by every handler
#[derive(Debug)]
pub enum ApiError {
    /// 400 with a specific reason
    BadRequest(String),
    /// 401, caller never authenticated
    NotAuthenticated,
    /// 401, session was destroyed (UA mismatch or otherwise invalidated);
    /// also clears the session cookie client-side
    SessionExpired,
    /// 401, login failed. One shape for wrong password and unknown
    /// username, so usernames can't be enumerated.
    InvalidCredentials,
    /// 403 with a machine-readable code
    Forbidden(&'static str),
    /// 404
    NotFound(&'static str),
    /// 409 with a machine-readable code
    Conflict(&'static str),
    /// 500, upstream provider failed; generic message to the caller
    Upstream,
    /// 500, internal failure; generic message to the caller
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code): (StatusCode, &str) = match &self {
            ApiError::BadRequest(reason) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"success": false, "error": reason})),
                )
                    .into_response();
            }
            ApiError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            ApiError::SessionExpired => {
                // Destroying the session server-side already happened;
                // the cookie has to go too.
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::SET_COOKIE, clear_session_cookie().to_string())],
                    Json(json!({"success": false, "error": "session_expired"})),
                )
                    .into_response();
            }
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            ApiError::Forbidden(code) => (StatusCode::FORBIDDEN, *code),
            ApiError::NotFound(code) => (StatusCode::NOT_FOUND, *code),
            ApiError::Conflict(code) => (StatusCode::CONFLICT, *code),
            ApiError::Upstream => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        (status, Json(json!({"success": false, "error": code}))).into_response()
    }
}

impl From<SessionExpired> for ApiError {
    fn from(_: SessionExpired) -> Self {
        ApiError::SessionExpired
    }
}

impl From<SpotifyError> for ApiError {
    fn from(e: SpotifyError) -> Self {
        error!("Provider call failed: {}", e);
        ApiError::Upstream
    }
}

impl From<encore_common::Error> for ApiError {
    fn from(e: encore_common::Error) -> Self {
        error!("Internal error: {}", e);
        ApiError::Internal
    }
}
