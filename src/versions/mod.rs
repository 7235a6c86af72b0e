//! Version persistence for workspace snapshots.
//!
//! A version is an immutable JSON serialization of the exported file tree,
//! recorded when a live artifact closes.

use crate::protocol::VersionRef;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Request to persist a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    pub project_id: String,
    pub message_key: String,
    pub files_string: String,
}

/// A persisted version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVersion {
    pub version_id: String,
    pub version_number: u32,
    pub project_id: String,
    pub message_key: String,
    pub created_at: DateTime<Utc>,
    pub files_string: String,
}

impl StoredVersion {
    pub fn to_ref(&self) -> VersionRef {
        VersionRef {
            version_id: self.version_id.clone(),
            version_number: self.version_number,
        }
    }
}

#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn create_version(&self, request: NewVersion) -> Result<VersionRef>;

    /// All versions of a project, oldest first.
    async fn list_versions(&self, project_id: &str) -> Result<Vec<StoredVersion>>;
}

/// Stores each version as `<dir>/<project_id>/v<number>.json`.
pub struct FileVersionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileVersionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.dir.join(project_id)
    }
}

#[async_trait]
impl VersionStore for FileVersionStore {
    async fn create_version(&self, request: NewVersion) -> Result<VersionRef> {
        let _guard = self.write_lock.lock().await;

        let existing = self.list_versions(&request.project_id).await?;
        let version_number = existing
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;

        let stored = StoredVersion {
            version_id: Uuid::new_v4().to_string(),
            version_number,
            project_id: request.project_id,
            message_key: request.message_key,
            created_at: Utc::now(),
            files_string: request.files_string,
        };

        let dir = self.project_dir(&stored.project_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create version directory {}", dir.display()))?;

        let path = dir.join(format!("v{:04}.json", version_number));
        let json = serde_json::to_string_pretty(&stored).context("Failed to serialize version")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write version file {}", path.display()))?;

        Ok(stored.to_ref())
    }

    async fn list_versions(&self, project_id: &str) -> Result<Vec<StoredVersion>> {
        let dir = self.project_dir(project_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to read version directory {}", dir.display()))?;
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read version file {}", path.display()))?;
            let version: StoredVersion = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse version file {}", path.display()))?;
            versions.push(version);
        }
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }
}

/// Keeps versions in memory. Useful for hosts without persistence and for tests.
#[derive(Default)]
pub struct InMemoryVersionStore {
    versions: Mutex<Vec<StoredVersion>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn create_version(&self, request: NewVersion) -> Result<VersionRef> {
        let mut versions = self.versions.lock().await;
        let version_number = versions
            .iter()
            .filter(|v| v.project_id == request.project_id)
            .count() as u32
            + 1;
        let stored = StoredVersion {
            version_id: Uuid::new_v4().to_string(),
            version_number,
            project_id: request.project_id,
            message_key: request.message_key,
            created_at: Utc::now(),
            files_string: request.files_string,
        };
        let version = stored.to_ref();
        versions.push(stored);
        Ok(version)
    }

    async fn list_versions(&self, project_id: &str) -> Result<Vec<StoredVersion>> {
        Ok(self
            .versions
            .lock()
            .await
            .iter()
            .filter(|v| v.project_id == project_id)
            .cloned()
            .collect())
    }
}
