//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `ENCORE_ROOT` environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("ENCORE_ROOT") {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = user_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get the per-user configuration file path for the platform
fn user_config_file() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .map(|d| d.join("encore").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("encore"))
        .unwrap_or_else(|| PathBuf::from("./encore_data"))
}

/// Ensure the root folder exists, creating it if needed
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!("Created root folder: {}", root.display());
    }
    Ok(())
}

/// Service settings loaded from `<root>/encore.toml`, with environment
/// overrides for the provider credentials.
///
/// Missing file or missing keys fall back to the compiled defaults; only a
/// malformed file is an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listen port
    pub port: u16,
    /// Artist cache time-to-live in minutes.
    /// Historical deployments used anything from 15 minutes to 12 hours;
    /// there is no authoritative value, so it is configuration.
    pub cache_ttl_minutes: u64,
    /// Background cache re-check interval in minutes
    pub refresh_interval_minutes: u64,
    /// Spotify application client id
    pub spotify_client_id: String,
    /// Spotify application client secret
    pub spotify_client_secret: String,
    /// OAuth redirect URI registered with the provider
    pub spotify_redirect_uri: String,
    /// Genre seeds used for top-artist discovery
    pub genre_seeds: Vec<String>,
    /// Minimum popularity (0-100) for discovered artists
    pub popularity_threshold: u8,
    /// Delay between detail-fetch batches, in milliseconds
    pub batch_delay_ms: u64,
    /// Market parameter for track lookups
    pub market: String,
    /// Whether `X-Forwarded-For` identifies the signup client. The listener
    /// binds loopback behind a reverse proxy, so this defaults to true; set
    /// it false when clients connect directly, otherwise the per-IP signup
    /// cap can be bypassed with a spoofed header.
    pub trust_proxy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3000,
            cache_ttl_minutes: 720,
            refresh_interval_minutes: 10,
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            spotify_redirect_uri: "http://127.0.0.1:3000/auth/spotify/callback".to_string(),
            genre_seeds: vec![
                "pop".to_string(),
                "rock".to_string(),
                "hip hop".to_string(),
                "electronic".to_string(),
                "indie".to_string(),
                "jazz".to_string(),
            ],
            popularity_threshold: 60,
            batch_delay_ms: 500,
            market: "US".to_string(),
            trust_proxy: true,
        }
    }
}

impl Settings {
    /// Load settings from `<root>/encore.toml`, then apply environment
    /// overrides for the Spotify credentials.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("encore.toml");

        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?
        } else {
            info!("No encore.toml found at {}, using defaults", path.display());
            Settings::default()
        };

        if let Ok(id) = std::env::var("SPOTIFY_CLIENT_ID") {
            settings.spotify_client_id = id;
        }
        if let Ok(secret) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            settings.spotify_client_secret = secret;
        }
        if let Ok(uri) = std::env::var("SPOTIFY_REDIRECT_URI") {
            settings.spotify_redirect_uri = uri;
        }

        Ok(settings)
    }

    /// Artist cache TTL as a number of seconds
    pub fn cache_ttl_seconds(&self) -> i64 {
        self.cache_ttl_minutes as i64 * 60
    }
}
