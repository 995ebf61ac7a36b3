//! Artist endpoints
//!
//! `GET /api/artists` prefers the session's personal Spotify list and falls
//! back to the disk-cached global list; `GET /api/artists/:id` always fetches
//! fresh detail and track data.

use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::ApiError;
use crate::session::SessionLookup;
use crate::spotify::{Artist, SpotifyError, TokenBundle, Track};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ArtistsResponse {
    pub success: bool,
    pub artists: Vec<Artist>,
    pub count: usize,
    /// "personal" (session-scoped list) or "global"
    pub source: &'static str,
    /// True when the global list came straight from the disk cache
    pub cached: bool,
    /// Unix seconds: snapshot time for cached responses, now otherwise
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct ArtistDetailsResponse {
    pub success: bool,
    pub artist: Artist,
    #[serde(rename = "topTracks")]
    pub top_tracks: Vec<Track>,
}

/// GET /api/artists
pub async fn get_artists(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
) -> Result<Json<ArtistsResponse>, ApiError> {
    let session = match state.sessions.resolve(&jar, &headers).await {
        SessionLookup::Expired => return Err(ApiError::SessionExpired),
        SessionLookup::Valid(id, session) => Some((id, session)),
        SessionLookup::Anonymous => None,
    };

    // Personal list first, when the session holds a provider token
    if let Some((session_id, session)) = &session {
        if let Some(bundle) = &session.spotify {
            match personal_artists(&state, session_id, bundle).await {
                Some(artists) => {
                    return Ok(Json(ArtistsResponse {
                        success: true,
                        count: artists.len(),
                        artists,
                        source: "personal",
                        cached: false,
                        timestamp: Utc::now().timestamp(),
                    }));
                }
                // Any personal-fetch failure drops the stored token and
                // falls back to the global list
                None => {
                    state
                        .sessions
                        .update(session_id, |s| s.spotify = None)
                        .await;
                }
            }
        }
    }

    // Global list: valid cache, else synchronous refresh
    let ttl = state.settings.cache_ttl_seconds();
    if let Some(snapshot) = state.artist_cache.read().await {
        if snapshot.is_valid(ttl) {
            return Ok(Json(ArtistsResponse {
                success: true,
                count: snapshot.payload.len(),
                artists: snapshot.payload,
                source: "global",
                cached: true,
                timestamp: snapshot.timestamp,
            }));
        }
    }

    let artists = refresh_global_artists(&state).await?;
    Ok(Json(ArtistsResponse {
        success: true,
        count: artists.len(),
        artists,
        source: "global",
        cached: false,
        timestamp: Utc::now().timestamp(),
    }))
}

/// GET /api/artists/:id
///
/// Track data is never cached: this always hits the provider, with the
/// session's token when present, else the app token.
pub async fn get_artist_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
) -> Result<Json<ArtistDetailsResponse>, ApiError> {
    let token = match state.sessions.resolve(&jar, &headers).await {
        SessionLookup::Expired => return Err(ApiError::SessionExpired),
        SessionLookup::Valid(_, session) => match session.spotify {
            Some(bundle) if !bundle.is_expired() => bundle.access_token,
            _ => state.spotify.app_token().await?,
        },
        SessionLookup::Anonymous => state.spotify.app_token().await?,
    };

    let artist = match state.spotify.artist(&token, &id).await {
        Ok(artist) => artist,
        Err(SpotifyError::Upstream(detail)) if detail.starts_with("404") => {
            return Err(ApiError::NotFound("artist_not_found"));
        }
        Err(e) => return Err(e.into()),
    };
    let top_tracks = state.spotify.artist_top_tracks(&token, &id).await?;

    Ok(Json(ArtistDetailsResponse {
        success: true,
        artist,
        top_tracks,
    }))
}

/// Fetch the user's personal top artists, transparently refreshing an
/// expired user token. `None` means the caller should drop the token.
async fn personal_artists(
    state: &AppState,
    session_id: &Uuid,
    bundle: &TokenBundle,
) -> Option<Vec<Artist>> {
    let access_token = if bundle.is_expired() {
        match state.spotify.refresh_user_token(&bundle.refresh_token).await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                state
                    .sessions
                    .update(session_id, |s| s.spotify = Some(fresh))
                    .await;
                token
            }
            Err(e) => {
                warn!("User token refresh failed: {}", e);
                return None;
            }
        }
    } else {
        bundle.access_token.clone()
    };

    match state.spotify.user_top_artists(&access_token).await {
        Ok(artists) => Some(artists),
        Err(e) => {
            warn!("Personal top-artist fetch failed, falling back to global: {}", e);
            None
        }
    }
}

/// Refresh the global artist list from the provider and persist the snapshot.
///
/// Shared by the request path (stale cache) and the periodic background
/// refresher. Concurrent refreshes race benignly: each write replaces the
/// whole file, so the later one wins.
pub async fn refresh_global_artists(state: &AppState) -> Result<Vec<Artist>, SpotifyError> {
    let token = state.spotify.app_token().await?;
    let artists = state.spotify.top_artists(&token).await?;

    // Write failures are logged inside the store and deliberately ignored
    state.artist_cache.write(&artists).await;

    info!("Refreshed global artist cache ({} artists)", artists.len());
    Ok(artists)
}
