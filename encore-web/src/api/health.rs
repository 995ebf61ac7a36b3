//! Health check endpoint

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache: CacheHealth,
}

/// Artist-cache health as reported by `/api/health`
#[derive(Debug, Serialize)]
pub struct CacheHealth {
    /// "ok" (valid), "stale" (past TTL) or "empty" (no snapshot)
    pub status: String,
    #[serde(rename = "ageSeconds")]
    pub age_seconds: Option<i64>,
    #[serde(rename = "artistCount")]
    pub artist_count: Option<usize>,
    #[serde(rename = "fileSizeKB")]
    pub file_size_kb: Option<u64>,
}

/// GET /api/health
///
/// No authentication; cache read failures report as "empty", never an error.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ttl = state.settings.cache_ttl_seconds();

    let cache = match state.artist_cache.read().await {
        Some(snapshot) => CacheHealth {
            status: if snapshot.is_valid(ttl) { "ok" } else { "stale" }.to_string(),
            age_seconds: Some(snapshot.age_seconds()),
            artist_count: Some(snapshot.payload.len()),
            file_size_kb: state.artist_cache.file_size_kb().await,
        },
        None => CacheHealth {
            status: "empty".to_string(),
            age_seconds: None,
            artist_count: None,
            file_size_kb: None,
        },
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        cache,
    })
}
