//! Local account endpoints: register, login, logout, me
//!
//! Passwords are hashed with argon2id. Login failures return one shape for
//! both wrong password and unknown username. Registration is throttled to a
//! fixed number of accounts per signup IP.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::{error, info};

use encore_common::db::queries;

use crate::api::ApiError;
use crate::session::{SessionLookup, SessionUser};
use crate::AppState;

/// Maximum accounts registered from a single IP
const MAX_ACCOUNTS_PER_IP: i64 = 3;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;

    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let ip = client_ip(&headers, peer.as_ref(), state.settings.trust_proxy);
    if queries::count_users_by_ip(&state.db, &ip).await? >= MAX_ACCOUNTS_PER_IP {
        return Err(ApiError::Forbidden("ip_limit"));
    }

    if queries::find_user_by_username(&state.db, &username).await?.is_some() {
        return Err(ApiError::Conflict("username_taken"));
    }

    let hash = hash_password(&req.password)?;

    // The UNIQUE constraint backstops the lookup above under races
    let user = match queries::create_user(&state.db, &username, &hash, &ip).await {
        Ok(user) => user,
        Err(encore_common::Error::Database(sqlx::Error::Database(e)))
            if e.is_unique_violation() =>
        {
            return Err(ApiError::Conflict("username_taken"));
        }
        Err(e) => return Err(e.into()),
    };

    info!("Registered user '{}' (id {})", user.username, user.id);

    let (session_id, _, jar) = state.sessions.resolve_or_create(jar, &headers).await?;
    state
        .sessions
        .update(&session_id, |s| {
            s.user = Some(SessionUser { id: user.id, username: user.username.clone() })
        })
        .await;

    Ok((jar, Json(json!({"success": true, "username": user.username}))))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let username = req.username.trim().to_lowercase();

    // Unknown user and wrong password take the same exit
    let user = queries::find_user_by_username(&state.db, &username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let (session_id, _, jar) = state.sessions.resolve_or_create(jar, &headers).await?;
    state
        .sessions
        .update(&session_id, |s| {
            s.user = Some(SessionUser { id: user.id, username: user.username.clone() })
        })
        .await;

    info!("User '{}' logged in", user.username);
    Ok((jar, Json(json!({"success": true, "username": user.username}))))
}

/// POST /api/auth/logout
///
/// Clears the local-account track only; an independent Spotify
/// authorization on the same session survives.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    match state.sessions.resolve(&jar, &headers).await {
        SessionLookup::Expired => Err(ApiError::SessionExpired),
        SessionLookup::Valid(id, _) => {
            state.sessions.update(&id, |s| s.user = None).await;
            Ok(Json(json!({"success": true})))
        }
        SessionLookup::Anonymous => Ok(Json(json!({"success": true}))),
    }
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    match state.sessions.resolve(&jar, &headers).await {
        SessionLookup::Expired => Err(ApiError::SessionExpired),
        SessionLookup::Valid(_, session) => Ok(Json(MeResponse {
            authenticated: session.user.is_some(),
            username: session.user.map(|u| u.username),
        })),
        SessionLookup::Anonymous => Ok(Json(MeResponse { authenticated: false, username: None })),
    }
}

// ============================================================================
// Validation and hashing
// ============================================================================

/// Normalize and validate a username: trimmed, lowercased, 3-32 chars from
/// `[a-z0-9_]`
fn validate_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim().to_lowercase();

    if username.len() < USERNAME_MIN || username.len() > USERNAME_MAX {
        return Err(ApiError::BadRequest(format!(
            "username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }

    if !username.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(ApiError::BadRequest(
            "username may only contain lowercase letters, digits and underscores".to_string(),
        ));
    }

    Ok(username)
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < PASSWORD_MIN || password.len() > PASSWORD_MAX {
        return Err(ApiError::BadRequest(format!(
            "password must be {}-{} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        error!("Stored password hash is unparseable");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Signup IP: first X-Forwarded-For hop when the deployment trusts its
/// proxy, else the socket peer
fn client_ip(headers: &HeaderMap, connect_info: Option<&SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    connect_info
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_normalized_and_validated() {
        assert_eq!(validate_username("  Alice_01 ").unwrap(), "alice_01");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("semi;colon").is_err());
    }

    #[test]
    fn test_password_length_is_enforced() {
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_hash_verifies_only_the_right_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-hash"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header_behind_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());

        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(&peer), true), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new(), Some(&peer), true), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn test_client_ip_ignores_forwarded_header_when_proxy_untrusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());

        let peer: SocketAddr = "192.0.2.5:9999".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(&peer), false), "192.0.2.5");
        assert_eq!(client_ip(&headers, None, false), "unknown");
    }
}
