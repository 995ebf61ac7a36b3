//! Server-side sessions
//!
//! Sessions live in process memory, keyed by an opaque uuid carried in an
//! httpOnly cookie. A session tracks two independent identity tracks (local
//! account, Spotify OAuth) plus the transient CSRF state of an in-flight
//! OAuth exchange and an optional user-agent fingerprint.
//!
//! UA binding invariant: once a fingerprint is captured, every subsequent
//! request presenting the session cookie must hash to the same value, or the
//! session is destroyed on the spot - before any protected logic runs.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::spotify::TokenBundle;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "encore_session";

/// The authenticated local account, as bound to a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
}

/// Per-session state
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Local account track
    pub user: Option<SessionUser>,
    /// Spotify OAuth track (independent of the local account)
    pub spotify: Option<TokenBundle>,
    /// CSRF state of an in-flight OAuth exchange
    pub pending_oauth_state: Option<String>,
    /// Hex SHA-256 of the User-Agent captured when OAuth completed
    pub ua_hash: Option<String>,
}

/// Marker error: the session failed its UA binding and was destroyed
#[derive(Debug)]
pub struct SessionExpired;

/// Result of resolving the session cookie on a request
#[derive(Debug)]
pub enum SessionLookup {
    /// No cookie, or cookie names a session that no longer exists
    Anonymous,
    /// A live session matching the request
    Valid(Uuid, Session),
    /// The session existed but its UA binding failed; it has been destroyed
    Expired,
}

/// In-memory session store
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session under a fresh id
    pub async fn create(&self, session: Session) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.insert(id, session);
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Session> {
        self.inner.read().await.get(id).cloned()
    }

    /// Apply a mutation to a live session; returns false if it's gone
    pub async fn update<F>(&self, id: &Uuid, f: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        match self.inner.write().await.get_mut(id) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    pub async fn destroy(&self, id: &Uuid) {
        self.inner.write().await.remove(id);
    }

    /// Resolve the request's session, enforcing the UA binding invariant.
    pub async fn resolve(&self, jar: &CookieJar, headers: &HeaderMap) -> SessionLookup {
        let id = match jar
            .get(SESSION_COOKIE)
            .and_then(|c| Uuid::parse_str(c.value()).ok())
        {
            Some(id) => id,
            None => return SessionLookup::Anonymous,
        };

        let session = match self.get(&id).await {
            Some(session) => session,
            None => return SessionLookup::Anonymous,
        };

        if let Some(stored) = &session.ua_hash {
            let current = hash_user_agent(headers);
            if *stored != current {
                warn!("User-agent fingerprint mismatch, destroying session {}", id);
                self.destroy(&id).await;
                return SessionLookup::Expired;
            }
        }

        SessionLookup::Valid(id, session)
    }

    /// Resolve the session or create a fresh anonymous one, returning a jar
    /// that carries the cookie. UA-binding failures still surface as
    /// `Expired` via `resolve`; callers map that to an auth error themselves.
    pub async fn resolve_or_create(
        &self,
        jar: CookieJar,
        headers: &HeaderMap,
    ) -> Result<(Uuid, Session, CookieJar), SessionExpired> {
        match self.resolve(&jar, headers).await {
            SessionLookup::Valid(id, session) => Ok((id, session, jar)),
            SessionLookup::Anonymous => {
                let session = Session::default();
                let id = self.create(session.clone()).await;
                let jar = jar.add(session_cookie(&id));
                Ok((id, session, jar))
            }
            SessionLookup::Expired => Err(SessionExpired),
        }
    }
}

/// Hex SHA-256 of the request's User-Agent header (empty string if absent)
pub fn hash_user_agent(headers: &HeaderMap) -> String {
    let ua = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let mut hasher = Sha256::new();
    hasher.update(ua.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the httpOnly session cookie
pub fn session_cookie(id: &Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Build an expired cookie that clears the session cookie client-side
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}
