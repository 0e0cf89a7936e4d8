//! Persistence of snapshots and digest drafts.
//!
//! Layout under the output root:
//!
//! ```text
//! monthly/<YYYY-MM>.json
//! digests/<YYYY-MM>/digest.json
//! digests/<YYYY-MM>/digest.md
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::period::MonthToken;
use crate::pipeline::{DigestRecord, RankingSnapshot};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("refusing to store period \"{0}\": expected YYYY-MM")]
    InvalidPeriod(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Where a digest's artifacts were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestLocation {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, returning its location relative to the store root.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the snapshot cannot be written.
    fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<PathBuf, StoreError>;

    /// # Errors
    /// Returns [`StoreError`] when a stored snapshot cannot be read.
    fn load_snapshot(&self, period: &str) -> Result<Option<RankingSnapshot>, StoreError>;

    /// # Errors
    /// Returns [`StoreError`] when either artifact cannot be written.
    fn save_digest(
        &self,
        digest: &DigestRecord,
        markdown: &str,
    ) -> Result<DigestLocation, StoreError>;
}

/// Relative path of a period's snapshot, also used as digest provenance.
#[must_use]
pub fn snapshot_relative_path(period: MonthToken) -> PathBuf {
    Path::new("monthly").join(format!("{period}.json"))
}

#[must_use]
pub fn digest_relative_dir(period: MonthToken) -> PathBuf {
    Path::new("digests").join(period.to_string())
}

/// Only well-formed `YYYY-MM` periods ever become path components.
fn checked_period(period: &str) -> Result<MonthToken, StoreError> {
    MonthToken::parse(period).map_err(|_| StoreError::InvalidPeriod(period.to_string()))
}

/// JSON files on disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, relative: &Path, contents: &str) -> Result<PathBuf, StoreError> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, contents).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = contents.len(), "artifact written");
        Ok(path)
    }
}

fn pretty_json<T: Serialize>(value: &T, path: &Path) -> Result<String, StoreError> {
    let mut rendered = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    rendered.push('\n');
    Ok(rendered)
}

impl SnapshotStore for FileSnapshotStore {
    fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<PathBuf, StoreError> {
        let relative = snapshot_relative_path(checked_period(&snapshot.period)?);
        let body = pretty_json(snapshot, &relative)?;
        let path = self.write(&relative, &body)?;
        info!(path = %path.display(), "snapshot saved");
        Ok(relative)
    }

    fn load_snapshot(&self, period: &str) -> Result<Option<RankingSnapshot>, StoreError> {
        let path = self.root.join(snapshot_relative_path(checked_period(period)?));
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    fn save_digest(
        &self,
        digest: &DigestRecord,
        markdown: &str,
    ) -> Result<DigestLocation, StoreError> {
        let dir = digest_relative_dir(checked_period(&digest.period)?);
        let json_relative = dir.join("digest.json");
        let body = pretty_json(digest, &json_relative)?;

        let json = self.write(&json_relative, &body)?;
        let markdown = self.write(&dir.join("digest.md"), markdown)?;
        info!(json = %json.display(), markdown = %markdown.display(), "digest saved");
        Ok(DigestLocation { json, markdown })
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, RankingSnapshot>>,
    digests: Mutex<HashMap<String, (DigestRecord, String)>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored digest and markdown for `period`, if any.
    ///
    /// # Errors
    /// Returns [`StoreError::Poisoned`] if a writer panicked.
    pub fn digest(&self, period: &str) -> Result<Option<(DigestRecord, String)>, StoreError> {
        let digests = self.digests.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(digests.get(period).cloned())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save_snapshot(&self, snapshot: &RankingSnapshot) -> Result<PathBuf, StoreError> {
        let period = checked_period(&snapshot.period)?;
        self.snapshots
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(snapshot.period.clone(), snapshot.clone());
        Ok(snapshot_relative_path(period))
    }

    fn load_snapshot(&self, period: &str) -> Result<Option<RankingSnapshot>, StoreError> {
        checked_period(period)?;
        let snapshots = self.snapshots.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(snapshots.get(period).cloned())
    }

    fn save_digest(
        &self,
        digest: &DigestRecord,
        markdown: &str,
    ) -> Result<DigestLocation, StoreError> {
        let dir = digest_relative_dir(checked_period(&digest.period)?);
        self.digests
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert(digest.period.clone(), (digest.clone(), markdown.to_string()));
        Ok(DigestLocation {
            json: dir.join("digest.json"),
            markdown: dir.join("digest.md"),
        })
    }
}
