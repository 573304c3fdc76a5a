//! JSON-file-backed configuration stores
//!
//! Small settings documents edited from the dashboard live as pretty JSON
//! files under `storage.path`. Writes go to a sibling temp file that is then
//! renamed over the original, so readers never see a half-written file.

mod settings;

pub use settings::{AnalyticsSettings, NavLink, SiteSettings, ToolSettings};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::StorageConfig;

/// One JSON document kept in memory and mirrored to disk
pub struct JsonStore<T> {
    path: PathBuf,
    value: RwLock<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync,
{
    /// Load `<dir>/<name>.json`; a missing or empty file yields `T::default()`
    pub async fn open(dir: &Path, name: &str) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create store directory {}", dir.display()))?;

        let path = dir.join(format!("{}.json", name));
        let value = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => T::default(),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse store file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read store file {}", path.display()))
            }
        };

        tracing::debug!("Opened store {}", path.display());
        Ok(Self {
            path,
            value: RwLock::new(value),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current value
    pub async fn get(&self) -> T {
        self.value.read().await.clone()
    }

    /// Replace the whole document
    pub async fn set(&self, value: T) -> Result<T> {
        self.update(|current| *current = value).await
    }

    /// Mutate in place and persist; the in-memory value only changes when the
    /// write succeeds
    pub async fn update<F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut T) + Send,
    {
        let mut guard = self.value.write().await;
        let mut next = guard.clone();
        f(&mut next);
        write_atomic(&self.path, &next).await?;
        *guard = next.clone();
        Ok(next)
    }
}

async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value).context("Failed to serialize store")?;
    let tmp_path = path.with_extension("json.tmp");

    tokio::fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("Failed to write temp store file {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to replace store file {}", path.display()))?;
    Ok(())
}

/// The three dashboard-managed documents
#[derive(Clone)]
pub struct Stores {
    pub site: Arc<JsonStore<SiteSettings>>,
    pub tools: Arc<JsonStore<ToolSettings>>,
    pub analytics: Arc<JsonStore<AnalyticsSettings>>,
}

impl Stores {
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let dir = config.path.as_path();
        Ok(Self {
            site: Arc::new(JsonStore::open(dir, "site").await?),
            tools: Arc::new(JsonStore::open(dir, "tools").await?),
            analytics: Arc::new(JsonStore::open(dir, "analytics").await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<SiteSettings> = JsonStore::open(dir.path(), "site").await.unwrap();
        assert_eq!(store.get().await, SiteSettings::default());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_update_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<ToolSettings> = JsonStore::open(dir.path(), "tools").await.unwrap();

        store
            .update(|t| t.disabled.push("ai-ocr".to_string()))
            .await
            .unwrap();
        assert!(store.get().await.is_disabled("ai-ocr"));
        assert!(!dir.path().join("tools.json.tmp").exists());

        let reopened: JsonStore<ToolSettings> = JsonStore::open(dir.path(), "tools").await.unwrap();
        assert!(reopened.get().await.is_disabled("ai-ocr"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("site.json"), "{not json").unwrap();
        let result: Result<JsonStore<SiteSettings>> = JsonStore::open(dir.path(), "site").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_file_yields_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("analytics.json"), "  \n").unwrap();
        let store: JsonStore<AnalyticsSettings> =
            JsonStore::open(dir.path(), "analytics").await.unwrap();
        assert!(store.get().await.ga4_measurement_id.is_none());
    }

    #[tokio::test]
    async fn test_open_all_stores() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            path: dir.path().join("nested"),
        };
        let stores = Stores::open(&config).await.unwrap();
        stores
            .site
            .set(SiteSettings {
                site_name: "Docs Desk".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(dir.path().join("nested").join("site.json").exists());
    }
}
