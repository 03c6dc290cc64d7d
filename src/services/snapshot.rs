use crate::config::IngestConfig;
use crate::detection::Snapshot;
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Subdirectory of the media root holding alert snapshots
pub const SNAPSHOT_DIR: &str = "crime_snapshots";

/// A snapshot written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub path: PathBuf,
    /// Public URL recorded on the alert
    pub url: String,
}

/// Writes uploaded snapshots under the media directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    url_prefix: String,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.media_dir.clone(), config.media_url.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `snapshot` to `<root>/crime_snapshots/` under a fresh name
    pub async fn save(&self, snapshot: &Snapshot) -> Result<StoredSnapshot> {
        let dir = self.root.join(SNAPSHOT_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create snapshot directory {:?}", dir))?;

        let id = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "snapshot_{}_{}.{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            &id[..8],
            extension_for(snapshot.content_type.as_deref())
        );
        let path = dir.join(&file_name);

        tokio::fs::write(&path, &snapshot.data)
            .await
            .with_context(|| format!("Failed to write snapshot {:?}", path))?;

        info!("Saved snapshot {:?} ({} bytes)", path, snapshot.data.len());

        Ok(StoredSnapshot {
            url: format!("{}/{}/{}", self.url_prefix, SNAPSHOT_DIR, file_name),
            path,
        })
    }

    /// Remove a snapshot whose alert was never stored
    pub async fn discard(&self, stored: &StoredSnapshot) {
        if let Err(e) = tokio::fs::remove_file(&stored.path).await {
            warn!("Failed to remove orphaned snapshot {:?}: {}", stored.path, e);
        }
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "jpg",
    }
}
