//! Disk snapshot cache
//!
//! Each snapshot is a single JSON file `{ "payload": ..., "timestamp": ... }`
//! under `<root>/cache/`, replaced wholesale on every write. Read failures of
//! any kind (missing file, unreadable file, corrupt JSON) degrade to "no
//! cache"; callers treat absence as a normal state and refresh. There is no
//! mutual exclusion around the file: concurrent refreshes race and the later
//! full-file write wins, which only costs a redundant upstream fetch.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A cached payload plus the instant it was written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub payload: T,
    /// Unix timestamp (seconds) of the write
    pub timestamp: i64,
}

impl<T> Snapshot<T> {
    /// Snapshot age in seconds (never negative)
    pub fn age_seconds(&self) -> i64 {
        (Utc::now().timestamp() - self.timestamp).max(0)
    }

    /// True iff `now - timestamp < ttl_seconds`.
    /// A snapshot exactly `ttl_seconds` old is already invalid.
    pub fn is_valid(&self, ttl_seconds: i64) -> bool {
        Utc::now().timestamp() - self.timestamp < ttl_seconds
    }
}

/// A single named snapshot file on disk
pub struct SnapshotStore<T> {
    path: PathBuf,
    _payload: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> SnapshotStore<T> {
    /// Store for `<root>/cache/<name>.json`
    pub fn new(root: &Path, name: &str) -> Self {
        Self {
            path: root.join("cache").join(format!("{}.json", name)),
            _payload: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, degrading every failure to `None`
    pub async fn read(&self) -> Option<Snapshot<T>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("Cache read miss at {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Discarding corrupt cache file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Write a new snapshot stamped with the current time, fully replacing
    /// any prior content. Returns false (after logging) on failure; a failed
    /// cache write never aborts the caller.
    pub async fn write(&self, payload: &T) -> bool {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Cache write failed (mkdir {}): {}", parent.display(), e);
                return false;
            }
        }

        let body = json!({
            "payload": payload,
            "timestamp": Utc::now().timestamp(),
        });

        let content = match serde_json::to_string_pretty(&body) {
            Ok(content) => content,
            Err(e) => {
                warn!("Cache write failed (serialize): {}", e);
                return false;
            }
        };

        match tokio::fs::write(&self.path, content).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write failed ({}): {}", self.path.display(), e);
                false
            }
        }
    }

    /// Size of the snapshot file in kilobytes, if it exists
    pub async fn file_size_kb(&self) -> Option<u64> {
        tokio::fs::metadata(&self.path)
            .await
            .ok()
            .map(|m| m.len() / 1024)
    }
}
