//! Spotify OAuth endpoints (authorization-code flow)
//!
//! The CSRF state lives in the session between `begin` and `callback` and is
//! discarded on the first callback no matter how the check goes, so a
//! captured redirect can't be replayed.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use axum_extra::extract::CookieJar;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::ApiError;
use crate::session::{hash_user_agent, SessionLookup};
use crate::AppState;

/// Length of the CSRF state value
const STATE_LEN: usize = 32;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub authenticated: bool,
}

/// GET /auth/spotify
///
/// Generates the CSRF state, parks it in the session, and redirects to the
/// provider's authorize endpoint.
pub async fn begin(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (session_id, _, jar) = state.sessions.resolve_or_create(jar, &headers).await?;

    let csrf_state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect();

    state
        .sessions
        .update(&session_id, |s| s.pending_oauth_state = Some(csrf_state.clone()))
        .await;

    let url = state.spotify.authorize_url(&csrf_state);
    Ok((jar, Redirect::temporary(&url)))
}

/// GET /auth/spotify/callback
///
/// Fails closed: any mismatch, provider error, or exchange failure redirects
/// back to the SPA with an error reason and stores nothing.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = match state.sessions.resolve(&jar, &headers).await {
        SessionLookup::Expired => return Err(ApiError::SessionExpired),
        SessionLookup::Valid(id, session) => Some((id, session)),
        SessionLookup::Anonymous => None,
    };

    let Some((session_id, session)) = session else {
        warn!("OAuth callback without a session");
        return Ok(Redirect::to("/?error=state_mismatch"));
    };

    // The pending state is single-use: discard it before any checks
    let expected = session.pending_oauth_state;
    state
        .sessions
        .update(&session_id, |s| s.pending_oauth_state = None)
        .await;

    if let Some(reason) = query.error {
        warn!("Provider reported OAuth error: {}", reason);
        return Ok(Redirect::to(&format!("/?error={}", reason)));
    }

    match (&expected, &query.state) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => {
            warn!("OAuth state mismatch, rejecting callback");
            return Ok(Redirect::to("/?error=state_mismatch"));
        }
    }

    let Some(code) = query.code else {
        return Ok(Redirect::to("/?error=missing_code"));
    };

    let bundle = match state.spotify.exchange_code(&code).await {
        Ok(bundle) => bundle,
        Err(e) => {
            warn!("Code exchange failed: {}", e);
            return Ok(Redirect::to("/?error=token_exchange"));
        }
    };

    // Bind the session to this client from here on
    let ua_hash = hash_user_agent(&headers);
    state
        .sessions
        .update(&session_id, |s| {
            s.spotify = Some(bundle);
            s.ua_hash = Some(ua_hash);
        })
        .await;

    info!("Spotify OAuth completed for session {}", session_id);
    Ok(Redirect::to("/?auth=success"))
}

/// GET /api/auth/spotify/status
pub async fn status(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    match state.sessions.resolve(&jar, &headers).await {
        SessionLookup::Expired => Err(ApiError::SessionExpired),
        SessionLookup::Valid(_, session) => Ok(Json(StatusResponse {
            authenticated: session.spotify.is_some(),
        })),
        SessionLookup::Anonymous => Ok(Json(StatusResponse { authenticated: false })),
    }
}

/// POST /api/auth/spotify/logout
///
/// Clears the Spotify track only; a local login on the same session survives.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    match state.sessions.resolve(&jar, &headers).await {
        SessionLookup::Expired => Err(ApiError::SessionExpired),
        SessionLookup::Valid(id, _) => {
            state
                .sessions
                .update(&id, |s| {
                    s.spotify = None;
                    s.ua_hash = None;
                })
                .await;
            Ok(Json(json!({"success": true})))
        }
        SessionLookup::Anonymous => Ok(Json(json!({"success": true}))),
    }
}
