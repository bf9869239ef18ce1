//! Local-disk report archive.
//!
//! [`FileArchive`] stores one file per report, named by its [`ReportId`],
//! under a configured root directory:
//!
//! ```text
//! <root>/
//! ├── 0f8fad5b-d9cb-469f-a165-70867728950e        finished report
//! └── 7c9e6679-7425-40de-944b-e07fc1f90ae7.tmp    write in progress
//! ```
//!
//! Writes land in a `.tmp` sibling first and are renamed into place, so a
//! reader (or a crash) never exposes a half-written artifact under the
//! report's name.
//!
//! Artifacts are not cleaned up and survive restarts, but nothing indexes
//! them again after a restart.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    backend::{ArchiveBackend, encode_report},
    error::{ConfigError, StorageError, StorageResult},
    types::{ReportEntry, ReportId},
};

/// Suffix of in-progress artifact files.
const TEMP_SUFFIX: &str = "tmp";

fn default_root() -> PathBuf {
    std::env::temp_dir()
}

/// Configuration for [`FileArchive`].
///
/// # Example
///
/// ```
/// use secretaudit_storage::FileArchiveConfig;
///
/// let config = FileArchiveConfig::builder().root("/var/lib/secretaudit/reports").build()?;
/// assert_eq!(config.root().to_str(), Some("/var/lib/secretaudit/reports"));
/// # Ok::<(), secretaudit_storage::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileArchiveConfig {
    /// Directory the report files are written to.
    #[serde(default = "default_root")]
    pub(crate) root: PathBuf,
}

impl Default for FileArchiveConfig {
    fn default() -> Self {
        Self { root: default_root() }
    }
}

#[bon::bon]
impl FileArchiveConfig {
    /// Creates a new archive configuration.
    ///
    /// `root` defaults to the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `root` is empty.
    #[builder]
    pub fn new(#[builder(into, default = default_root())] root: PathBuf) -> Result<Self, ConfigError> {
        if root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "root", reason: "must not be empty".into() });
        }
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Report archive backed by one file per report on local disk.
#[derive(Debug, Clone)]
pub struct FileArchive {
    root: PathBuf,
}

impl FileArchive {
    /// Creates an archive rooted at the configured directory.
    ///
    /// The directory is created on first write if it does not exist.
    #[must_use]
    pub fn new(config: FileArchiveConfig) -> Self {
        Self { root: config.root }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the artifact path for `id` if the report file exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file cannot be inspected.
    pub async fn locate(&self, id: &ReportId) -> StorageResult<Option<PathBuf>> {
        Ok(self.exists(id).await?.then(|| self.path_for(id)))
    }

    fn path_for(&self, id: &ReportId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn temp_path_for(&self, id: &ReportId) -> PathBuf {
        self.root.join(format!("{id}.{TEMP_SUFFIX}"))
    }

    async fn ensure_root(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::io_with_source(
                format!("failed to create archive directory {}", self.root.display()),
                e,
            )
        })
    }
}

#[async_trait]
impl ArchiveBackend for FileArchive {
    #[tracing::instrument(skip(self, entries), fields(report_id = %id, entries = entries.len()))]
    async fn write(&self, id: &ReportId, entries: &[ReportEntry]) -> StorageResult<()> {
        let encoded = encode_report(entries)?;
        self.ensure_root().await?;

        let temp_path = self.temp_path_for(id);
        let final_path = self.path_for(id);

        if let Err(e) = tokio::fs::write(&temp_path, &encoded).await {
            remove_quietly(&temp_path).await;
            return Err(StorageError::io_with_source("failed to write report file", e));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            remove_quietly(&temp_path).await;
            return Err(StorageError::io_with_source("failed to move report file into place", e));
        }

        debug!(path = %final_path.display(), bytes = encoded.len(), "report file written");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(report_id = %id))]
    async fn read_raw(&self, id: &ReportId) -> StorageResult<Bytes> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(id.to_string())),
            Err(e) => Err(StorageError::io_with_source("failed to read report file", e)),
        }
    }

    async fn exists(&self, id: &ReportId) -> StorageResult<bool> {
        tokio::fs::try_exists(self.path_for(id))
            .await
            .map_err(|e| StorageError::io_with_source("failed to stat report file", e))
    }

    fn artifact_path(&self, id: &ReportId) -> Option<PathBuf> {
        Some(self.path_for(id))
    }

    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    async fn health_check(&self) -> StorageResult<()> {
        self.ensure_root().await?;
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| StorageError::io_with_source("failed to stat archive directory", e))?;
        if !metadata.is_dir() {
            return Err(StorageError::io(format!("{} is not a directory", self.root.display())));
        }
        if metadata.permissions().readonly() {
            return Err(StorageError::io(format!("{} is read-only", self.root.display())));
        }
        Ok(())
    }
}

/// Best-effort removal of a leftover temp file.
async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove temporary report file");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::{backend::decode_report, conformance, testutil::sample_entries};

    fn archive_in(dir: &TempDir) -> FileArchive {
        FileArchive::new(FileArchiveConfig::builder().root(dir.path()).build().unwrap())
    }

    #[test]
    fn test_config_defaults_to_temp_dir() {
        let config = FileArchiveConfig::builder().build().unwrap();
        assert_eq!(config.root(), std::env::temp_dir());
        assert_eq!(config, FileArchiveConfig::default());
    }

    #[test]
    fn test_config_rejects_empty_root() {
        let err = FileArchiveConfig::builder().root("").build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "root", .. }));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: FileArchiveConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.root(), std::env::temp_dir());

        let err = serde_json::from_str::<FileArchiveConfig>(r#"{"root":"/x","extra":1}"#);
        assert!(err.is_err(), "unknown fields must be rejected");
    }

    #[tokio::test]
    async fn test_artifact_file_is_named_by_report_id() {
        let dir = TempDir::new().unwrap();
        let archive = archive_in(&dir);
        let id = ReportId::generate();
        let entries = sample_entries(2);

        archive.write(&id, &entries).await.unwrap();

        let path = dir.path().join(id.to_string());
        assert_eq!(archive.artifact_path(&id), Some(path.clone()));
        assert_eq!(archive.locate(&id).await.unwrap(), Some(path.clone()));
        assert_eq!(archive.locate(&ReportId::generate()).await.unwrap(), None);
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(decode_report(&on_disk).unwrap(), entries);
        assert!(!dir.path().join(format!("{id}.tmp")).exists(), "temp file must be renamed away");
    }

    #[tokio::test]
    async fn test_write_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let archive = FileArchive::new(FileArchiveConfig::builder().root(&nested).build().unwrap());

        archive.write(&ReportId::generate(), &[]).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_write_failure_leaves_no_artifact() {
        let dir = TempDir::new().unwrap();
        // A regular file where the root directory should be makes every write fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let archive = FileArchive::new(FileArchiveConfig::builder().root(&blocker).build().unwrap());
        let id = ReportId::generate();

        let err = archive.write(&id, &sample_entries(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }), "got {err:?}");
        assert!(archive.read_raw(&id).await.is_err());
        assert!(archive.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_stray_temp_file_is_not_an_artifact() {
        let dir = TempDir::new().unwrap();
        let archive = archive_in(&dir);
        let id = ReportId::generate();
        std::fs::write(dir.path().join(format!("{id}.tmp")), b"[").unwrap();

        assert!(!archive.exists(&id).await.unwrap());
        assert!(archive.read_raw(&id).await.unwrap_err().is_not_found());
    }

    // ------------------------------------------------------------------
    // Conformance suite
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn conformance_read_missing_returns_not_found() {
        let dir = TempDir::new().unwrap();
        conformance::read_missing_returns_not_found(&archive_in(&dir)).await;
    }

    #[tokio::test]
    async fn conformance_write_then_read_returns_json_array() {
        let dir = TempDir::new().unwrap();
        conformance::write_then_read_returns_json_array(&archive_in(&dir)).await;
    }

    #[tokio::test]
    async fn conformance_write_preserves_entry_order() {
        let dir = TempDir::new().unwrap();
        conformance::write_preserves_entry_order(&archive_in(&dir)).await;
    }

    #[tokio::test]
    async fn conformance_write_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        conformance::write_overwrites_existing(&archive_in(&dir)).await;
    }

    #[tokio::test]
    async fn conformance_exists_tracks_writes() {
        let dir = TempDir::new().unwrap();
        conformance::exists_tracks_writes(&archive_in(&dir)).await;
    }

    #[tokio::test]
    async fn conformance_distinct_ids_are_isolated() {
        let dir = TempDir::new().unwrap();
        conformance::distinct_ids_are_isolated(&archive_in(&dir)).await;
    }

    #[tokio::test]
    async fn conformance_health_check_succeeds() {
        let dir = TempDir::new().unwrap();
        conformance::health_check_succeeds(&archive_in(&dir)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn conformance_concurrent_writes_distinct_ids() {
        let dir = TempDir::new().unwrap();
        conformance::concurrent_writes_distinct_ids(Arc::new(archive_in(&dir))).await;
    }

    #[tokio::test]
    async fn conformance_run_all() {
        let dir = TempDir::new().unwrap();
        conformance::run_all(|| archive_in(&dir)).await;
    }
}
