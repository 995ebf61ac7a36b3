//! Spotify Web API client
//!
//! App-level (client-credentials) tokens are guarded by a disk snapshot and
//! only re-fetched on miss or expiry. Discovery and detail fetches go through
//! a concurrency-of-one rate limiter with a configurable minimum interval.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, Utc};
use reqwest::{Response, Url};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use encore_common::cache::SnapshotStore;
use encore_common::config::Settings;

use super::{Artist, CachedToken, SpotifyError, TokenBundle, Track, WireArtist, WireTrack};

const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
const API_BASE_URL: &str = "https://api.spotify.com/v1";
/// OAuth scopes requested in the authorization-code flow
const OAUTH_SCOPES: &str = "user-top-read";
/// Provider-imposed maximum ids per detail-fetch batch
const MAX_IDS_PER_BATCH: usize = 50;
/// Size of the served top-artist list
const TOP_ARTIST_COUNT: usize = 50;
/// Seconds knocked off a token's advertised lifetime before it is treated
/// as expired, so a token is never used right at the wire
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Rate limiter enforcing a minimum interval between provider calls
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: SearchArtists,
}

#[derive(Debug, Deserialize)]
struct SearchArtists {
    #[serde(default)]
    items: Vec<WireArtist>,
}

#[derive(Debug, Deserialize)]
struct ArtistsResponse {
    #[serde(default)]
    artists: Vec<WireArtist>,
}

#[derive(Debug, Deserialize)]
struct TopArtistsResponse {
    #[serde(default)]
    items: Vec<WireArtist>,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    #[serde(default)]
    tracks: Vec<WireTrack>,
}

/// Spotify Web API client
pub struct SpotifyClient {
    http: reqwest::Client,
    settings: Arc<Settings>,
    token_store: SnapshotStore<CachedToken>,
    rate_limiter: RateLimiter,
}

impl SpotifyClient {
    pub fn new(settings: Arc<Settings>, root: &Path) -> Result<Self, SpotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SpotifyError::Upstream(e.to_string()))?;

        let rate_limiter = RateLimiter::new(settings.batch_delay_ms);

        Ok(Self {
            http,
            settings,
            token_store: SnapshotStore::new(root, "token"),
            rate_limiter,
        })
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// App-level access token via the client-credentials grant.
    ///
    /// The disk snapshot is consulted first; a network exchange only happens
    /// on miss or expiry, and the fresh token is persisted afterward.
    pub async fn app_token(&self) -> Result<String, SpotifyError> {
        if let Some(snapshot) = self.token_store.read().await {
            if !snapshot.payload.is_expired() {
                return Ok(snapshot.payload.access_token);
            }
            debug!("Cached app token expired, fetching a new one");
        }

        let response = self
            .http
            .post(format!("{}/api/token", ACCOUNTS_BASE_URL))
            .basic_auth(
                &self.settings.spotify_client_id,
                Some(&self.settings.spotify_client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SpotifyError::Upstream(e.to_string()))?;

        let token: TokenResponse = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now().timestamp() + token.expires_in - TOKEN_EXPIRY_MARGIN_SECS,
        };
        // A failed cache write only costs a re-fetch next time
        self.token_store.write(&cached).await;

        info!("Fetched new app token (expires in {}s)", token.expires_in);
        Ok(token.access_token)
    }

    /// Authorize URL for the authorization-code flow
    pub fn authorize_url(&self, state: &str) -> String {
        let url = Url::parse_with_params(
            &format!("{}/authorize", ACCOUNTS_BASE_URL),
            &[
                ("client_id", self.settings.spotify_client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.settings.spotify_redirect_uri.as_str()),
                ("scope", OAUTH_SCOPES),
                ("state", state),
            ],
        )
        .expect("authorize URL is statically valid");

        url.into()
    }

    /// Exchange an authorization code for a user token bundle
    pub async fn exchange_code(&self, code: &str) -> Result<TokenBundle, SpotifyError> {
        let response = self
            .http
            .post(format!("{}/api/token", ACCOUNTS_BASE_URL))
            .basic_auth(
                &self.settings.spotify_client_id,
                Some(&self.settings.spotify_client_secret),
            )
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.spotify_redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SpotifyError::Upstream(e.to_string()))?;

        let token: TokenResponse = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(TokenBundle {
            access_token: token.access_token,
            refresh_token: token.refresh_token.unwrap_or_default(),
            expires_at: Utc::now().timestamp() + token.expires_in - TOKEN_EXPIRY_MARGIN_SECS,
        })
    }

    /// Refresh an expired user token.
    /// The provider may rotate the refresh token; when it doesn't send one,
    /// the old refresh token stays valid and is carried forward.
    pub async fn refresh_user_token(&self, refresh_token: &str) -> Result<TokenBundle, SpotifyError> {
        let response = self
            .http
            .post(format!("{}/api/token", ACCOUNTS_BASE_URL))
            .basic_auth(
                &self.settings.spotify_client_id,
                Some(&self.settings.spotify_client_secret),
            )
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| SpotifyError::Upstream(e.to_string()))?;

        let token: TokenResponse = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(TokenBundle {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_at: Utc::now().timestamp() + token.expires_in - TOKEN_EXPIRY_MARGIN_SECS,
        })
    }

    // ========================================================================
    // Artist fetches
    // ========================================================================

    /// Global top-artist list: genre-seed discovery followed by a batched
    /// detail fetch, sorted by descending popularity and capped.
    pub async fn top_artists(&self, token: &str) -> Result<Vec<Artist>, SpotifyError> {
        let mut candidate_ids: Vec<String> = Vec::new();

        // Discovery phase: one search per genre seed. A failed seed is
        // logged and skipped; the result is allowed to come up short.
        for seed in &self.settings.genre_seeds {
            match self.search_artists(token, &format!("genre:\"{}\"", seed)).await {
                Ok(items) => {
                    for artist in items {
                        if artist.popularity >= self.settings.popularity_threshold
                            && !candidate_ids.contains(&artist.id)
                        {
                            candidate_ids.push(artist.id);
                        }
                    }
                }
                Err(SpotifyError::Auth(e)) => return Err(SpotifyError::Auth(e)),
                Err(e) => warn!("Genre seed '{}' search failed: {}", seed, e),
            }
        }

        // Too few candidates: top up with a recency-based search
        if candidate_ids.len() < TOP_ARTIST_COUNT {
            let query = format!("year:{}", Utc::now().year());
            match self.search_artists(token, &query).await {
                Ok(items) => {
                    for artist in items {
                        if !candidate_ids.contains(&artist.id) {
                            candidate_ids.push(artist.id);
                        }
                        if candidate_ids.len() >= TOP_ARTIST_COUNT * 2 {
                            break;
                        }
                    }
                }
                Err(e) => warn!("Recency fallback search failed: {}", e),
            }
        }

        // Detail phase: sequential batches of at most 50 ids. Failed batches
        // are excluded rather than aborting the fetch.
        let mut artists: Vec<Artist> = Vec::with_capacity(candidate_ids.len());
        for batch in candidate_ids.chunks(MAX_IDS_PER_BATCH) {
            match self.fetch_artist_batch(token, batch).await {
                Ok(mut fetched) => artists.append(&mut fetched),
                Err(e) => warn!("Artist detail batch failed ({} ids): {}", batch.len(), e),
            }
        }

        artists.sort_by(|a, b| b.popularity.cmp(&a.popularity));
        artists.truncate(TOP_ARTIST_COUNT);

        info!("Fetched {} top artists from provider", artists.len());
        Ok(artists)
    }

    /// The authenticated user's personal top artists
    pub async fn user_top_artists(&self, user_token: &str) -> Result<Vec<Artist>, SpotifyError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/me/top/artists?limit={}", API_BASE_URL, TOP_ARTIST_COUNT);
        let response = self.get_authed(&url, user_token).await?;

        let body: TopArtistsResponse = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(body.items.into_iter().map(Artist::from).collect())
    }

    /// Single-artist detail (never cached)
    pub async fn artist(&self, token: &str, id: &str) -> Result<Artist, SpotifyError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/artists/{}", API_BASE_URL, id);
        let response = self.get_authed(&url, token).await?;

        let wire: WireArtist = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(wire.into())
    }

    /// Top tracks for an artist (never cached), capped to 5
    pub async fn artist_top_tracks(&self, token: &str, id: &str) -> Result<Vec<Track>, SpotifyError> {
        self.rate_limiter.wait().await;

        let url = format!(
            "{}/artists/{}/top-tracks?market={}",
            API_BASE_URL, id, self.settings.market
        );
        let response = self.get_authed(&url, token).await?;

        let body: TopTracksResponse = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(body.tracks.into_iter().take(5).map(Track::from).collect())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn search_artists(&self, token: &str, query: &str) -> Result<Vec<WireArtist>, SpotifyError> {
        self.rate_limiter.wait().await;

        let url = Url::parse_with_params(
            &format!("{}/search", API_BASE_URL),
            &[("q", query), ("type", "artist"), ("limit", "50")],
        )
        .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        let response = self.get_authed(url.as_str(), token).await?;

        let body: SearchResponse = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(body.artists.items)
    }

    async fn fetch_artist_batch(&self, token: &str, ids: &[String]) -> Result<Vec<Artist>, SpotifyError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/artists?ids={}", API_BASE_URL, ids.join(","));
        let response = self.get_authed(&url, token).await?;

        let body: ArtistsResponse = check_status(response).await?.json().await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(body.artists.into_iter().map(Artist::from).collect())
    }

    async fn get_authed(&self, url: &str, token: &str) -> Result<Response, SpotifyError> {
        self.http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SpotifyError::Upstream(e.to_string()))
    }
}

/// Map non-success provider statuses onto the error taxonomy
async fn check_status(response: Response) -> Result<Response, SpotifyError> {
    let status = response.status();

    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(SpotifyError::Auth(format!("{}: {}", status, body)));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SpotifyError::Upstream(format!("{}: {}", status, body)));
    }

    Ok(response)
}
