//! # Snapshot Stores
//!
//! Where the [`Snapshot`] lives between runs.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     JsonFileStore::save()                               │
//! │                                                                         │
//! │  Snapshot ──► serde_json::to_vec_pretty                                 │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │           cache.json.tmp   (create parent dirs, write, flush)           │
//! │                    │                                                    │
//! │                    ▼  rename                                            │
//! │           cache.json       (readers never see a half-written file)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use marquee_core::Snapshot;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Store Trait
// =============================================================================

/// Persistence seam for the digest engine.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the last saved snapshot.
    async fn load(&self) -> StoreResult<Snapshot>;

    /// Replaces the saved snapshot.
    async fn save(&self, snapshot: &Snapshot) -> StoreResult<()>;
}

// =============================================================================
// JSON File Store
// =============================================================================

/// Stores the snapshot as one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> StoreResult<Snapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                })
            }
            Err(err) => return Err(self.io_error(err)),
        };

        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            sessions = snapshot.sessions.len(),
            media = snapshot.recently_added.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self, snapshot), fields(path = %self.path.display()))]
    async fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| self.io_error(err))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|err| self.io_error(err))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|err| self.io_error(err))?;

        debug!(bytes = bytes.len(), "Snapshot saved");
        Ok(())
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// Keeps the snapshot in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Option<Snapshot>>,
    saves: RwLock<usize>,
}

impl MemoryStore {
    /// Creates a store with nothing saved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        MemoryStore {
            snapshot: RwLock::new(Some(snapshot)),
            saves: RwLock::new(0),
        }
    }

    /// Returns the last saved snapshot, if any.
    pub async fn current(&self) -> Option<Snapshot> {
        self.snapshot.read().await.clone()
    }

    /// Number of successful saves.
    pub async fn save_count(&self) -> usize {
        *self.saves.read().await
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> StoreResult<Snapshot> {
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::NotFound {
                path: PathBuf::from(":memory:"),
            })
    }

    async fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        *self.snapshot.write().await = Some(snapshot.clone());
        *self.saves.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::{diff_media, RecordTag, ServerRecord};
    use std::collections::BTreeMap;

    fn sample_snapshot() -> Snapshot {
        let fresh = vec![
            ServerRecord::new(RecordTag::Video)
                .with_rating_key("4711")
                .with_title("Heat"),
        ];
        Snapshot {
            recently_added: diff_media(&BTreeMap::new(), fresh).snapshot,
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("cache.json"));

        let snapshot = sample_snapshot();
        store.save(&snapshot).await.unwrap();

        assert!(store.path().exists());
        assert!(!store.temp_path().exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cache.json"));

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(err.is_recoverable_on_load());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert!(err.is_recoverable_on_load());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cache.json"));

        store.save(&sample_snapshot()).await.unwrap();
        store.save(&Snapshot::new()).await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.load().await,
            Err(StoreError::NotFound { .. })
        ));

        store.save(&sample_snapshot()).await.unwrap();
        assert_eq!(store.save_count().await, 1);
        assert_eq!(store.load().await.unwrap(), sample_snapshot());
    }
}
