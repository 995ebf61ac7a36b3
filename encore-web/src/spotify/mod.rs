//! Spotify Web API integration

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod client;

/// Spotify client errors
///
/// Credential problems are kept distinct from transient fetch failures so
/// callers can drop a bad token instead of retrying it.
#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Provider rejected credentials: {0}")]
    Auth(String),

    #[error("Provider request failed: {0}")]
    Upstream(String),

    #[error("Provider response parse error: {0}")]
    Parse(String),
}

/// Number of display genre tags kept per artist
const DISPLAY_GENRES: usize = 2;

/// An artist as served to the UI and stored in the artist cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// Genre tags, truncated for display
    pub genres: Vec<String>,
    /// Popularity score 0-100
    pub popularity: u8,
    pub followers: u64,
    /// Image variants, largest first
    pub images: Vec<Image>,
    /// Deep link into Spotify
    pub spotify_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

/// A track from an artist's top-tracks list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    /// Album title
    pub album: String,
    pub preview_url: Option<String>,
    pub spotify_url: String,
}

/// A user-scoped access + refresh token pair from the authorization-code flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, unix seconds
    pub expires_at: i64,
}

impl TokenBundle {
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at
    }
}

/// Cached app-level (client-credentials) token snapshot payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    /// Absolute expiry, unix seconds (already includes a safety margin)
    pub expires_at: i64,
}

impl CachedToken {
    /// An expired token must never be handed to a caller
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at
    }
}

// ============================================================================
// Wire formats (provider JSON shapes, mapped to the public models above)
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u8,
    #[serde(default)]
    pub followers: WireFollowers,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: WireExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireFollowers {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireExternalUrls {
    #[serde(default)]
    pub spotify: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTrack {
    pub id: String,
    pub name: String,
    pub album: WireAlbum,
    pub preview_url: Option<String>,
    #[serde(default)]
    pub external_urls: WireExternalUrls,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAlbum {
    pub name: String,
}

impl From<WireArtist> for Artist {
    fn from(w: WireArtist) -> Self {
        let mut genres = w.genres;
        genres.truncate(DISPLAY_GENRES);

        let mut images = w.images;
        images.sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));

        Artist {
            id: w.id,
            name: w.name,
            genres,
            popularity: w.popularity.min(100),
            followers: w.followers.total,
            images,
            spotify_url: w.external_urls.spotify,
        }
    }
}

impl From<WireTrack> for Track {
    fn from(w: WireTrack) -> Self {
        Track {
            id: w.id,
            name: w.name,
            album: w.album.name,
            preview_url: w.preview_url,
            spotify_url: w.external_urls.spotify,
        }
    }
}
