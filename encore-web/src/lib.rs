//! encore-web library - HTTP service for the Encore music dashboard
//!
//! Proxies the Spotify Web API behind a disk-backed cache, manages per-session
//! Spotify OAuth alongside local username/password accounts, and serves the
//! embedded single-page UI.

use std::path::Path;
use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use encore_common::cache::SnapshotStore;
use encore_common::config::Settings;

pub mod api;
pub mod session;
pub mod spotify;

use session::SessionStore;
use spotify::{client::SpotifyClient, Artist};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (users, comments)
    pub db: SqlitePool,
    /// In-memory session store keyed by the session cookie
    pub sessions: SessionStore,
    /// Spotify Web API client
    pub spotify: Arc<SpotifyClient>,
    /// Disk snapshot of the global top-artist list
    pub artist_cache: Arc<SnapshotStore<Vec<Artist>>>,
    /// Service settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create new application state rooted at the given data folder
    pub fn new(db: SqlitePool, settings: Arc<Settings>, root: &Path) -> encore_common::Result<Self> {
        let spotify = SpotifyClient::new(Arc::clone(&settings), root)
            .map_err(|e| encore_common::Error::Internal(e.to_string()))?;

        Ok(Self {
            db,
            sessions: SessionStore::new(),
            spotify: Arc::new(spotify),
            artist_cache: Arc::new(SnapshotStore::new(root, "artists")),
            settings,
        })
    }
}

/// Build application router
///
/// All `/api` routes answer JSON; anything else that doesn't match a route
/// falls back to the embedded SPA index page.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Artists (global cache or per-session personal list)
        .route("/api/health", get(api::health::health_check))
        .route("/api/artists", get(api::artists::get_artists))
        .route("/api/artists/:id", get(api::artists::get_artist_details))
        // Spotify OAuth (authorization-code flow)
        .route("/auth/spotify", get(api::oauth::begin))
        .route("/auth/spotify/callback", get(api::oauth::callback))
        .route("/api/auth/spotify/status", get(api::oauth::status))
        .route("/api/auth/spotify/logout", post(api::oauth::logout))
        // Local accounts
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/auth/me", get(api::auth::me))
        // Comments
        .route("/api/comments", get(api::comments::list).post(api::comments::create))
        .route("/api/comments/:id", delete(api::comments::remove))
        // Embedded UI
        .route("/", get(api::ui::serve_index))
        .route("/static/app.js", get(api::ui::serve_app_js))
        .fallback(api::ui::spa_fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
