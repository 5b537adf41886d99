//! Document sources: where batches come from.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::Value;

/// Failure to enumerate or retrieve a document.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not read {location}")]
    Io {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("could not parse JSON in {location}")]
    Parse {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{location}: {reason}")]
    Malformed { location: String, reason: String },
}

/// One child of a listed location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    /// Containers hold further entries (entity types, entity directories);
    /// everything else is ignored by the loader.
    pub is_container: bool,
}

/// Retrieval seam for one batch run.
pub trait DocumentSource: Send + Sync {
    /// Parse the document at `location`.
    fn fetch(&self, location: &str) -> Result<Value, SourceError>;

    /// Children of `location`, in a stable order.
    fn list(&self, location: &str) -> Result<Vec<Entry>, SourceError>;
}

/// An API archive on disk: one directory per entity, each holding an
/// `index.json` with the entity's document.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, location: &str) -> PathBuf {
        location
            .split('/')
            .filter(|seg| !seg.is_empty())
            .fold(self.root.clone(), |path, seg| path.join(seg))
    }
}

impl DocumentSource for FsArchive {
    fn fetch(&self, location: &str) -> Result<Value, SourceError> {
        let path = self.dir(location).join("index.json");
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(location.to_string()),
            _ => SourceError::Io {
                location: path.display().to_string(),
                source,
            },
        })?;
        serde_json::from_slice(&bytes).map_err(|source| SourceError::Parse {
            location: path.display().to_string(),
            source,
        })
    }

    fn list(&self, location: &str) -> Result<Vec<Entry>, SourceError> {
        let dir = self.dir(location);
        let read = fs::read_dir(&dir).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(location.to_string()),
            _ => SourceError::Io {
                location: dir.display().to_string(),
                source,
            },
        })?;

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|source| SourceError::Io {
                location: dir.display().to_string(),
                source,
            })?;
            let file_type = entry.file_type().map_err(|source| SourceError::Io {
                location: dir.display().to_string(),
                source,
            })?;
            entries.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_container: file_type.is_dir(),
            });
        }
        // Filesystem order is arbitrary; keep listings deterministic.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
