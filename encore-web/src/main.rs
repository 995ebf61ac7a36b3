//! encore-web - Spotify-proxying music dashboard
//!
//! Serves the embedded SPA, the artist API backed by a disk snapshot cache,
//! per-session Spotify OAuth, local accounts, and the comments board.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use encore_common::config::{ensure_root_folder, resolve_root_folder, Settings};
use encore_common::db::init_database;
use encore_web::{api, build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "encore-web", version, about = "Encore music dashboard server")]
struct Args {
    /// Data root folder (cache files, database, encore.toml)
    #[arg(long)]
    root_folder: Option<String>,

    /// Listen port (overrides encore.toml)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting Encore (encore-web) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref());
    ensure_root_folder(&root_folder)?;
    info!("Root folder: {}", root_folder.display());

    let mut settings = Settings::load(&root_folder)?;
    if let Some(port) = args.port {
        settings.port = port;
    }
    if settings.spotify_client_id.is_empty() || settings.spotify_client_secret.is_empty() {
        warn!("Spotify credentials are not configured; provider fetches will fail");
        warn!("Set SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET or edit encore.toml");
    }
    let settings = Arc::new(settings);

    let db_path = root_folder.join("encore.db");
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool, Arc::clone(&settings), &root_folder)?;

    // Periodic cache re-check; races with request-triggered refreshes are
    // benign (each cache write replaces the whole file)
    tokio::spawn(cache_refresher(state.clone()));

    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("encore-web listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Re-check artist-cache validity on a fixed interval and refresh when stale
async fn cache_refresher(state: AppState) {
    let period = Duration::from_secs(state.settings.refresh_interval_minutes * 60);
    let mut interval = tokio::time::interval(period);
    // The first tick fires immediately; that doubles as the warm-up fetch
    loop {
        interval.tick().await;

        let ttl = state.settings.cache_ttl_seconds();
        let valid = state
            .artist_cache
            .read()
            .await
            .map(|s| s.is_valid(ttl))
            .unwrap_or(false);

        if valid {
            continue;
        }

        info!("Artist cache stale or empty, refreshing in background");
        if let Err(e) = api::artists::refresh_global_artists(&state).await {
            warn!("Background artist refresh failed: {}", e);
        }
    }
}
