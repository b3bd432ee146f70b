//! Artifact addressing and the filesystem-backed [`ArtifactStore`].
//!
//! An [`ArtifactKey`] is an optional namespace (the request id when requests
//! are isolated) plus a file name. Its download path is `namespace/name` or
//! just `name`; [`ArtifactKey::from_download_path`] is the only way untrusted
//! paths become keys, and it refuses anything that could leave the output
//! directory.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::contract::ArtifactStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("invalid artifact path: {0}")]
    InvalidKey(String),

    #[error("could not serialise snapshot: {0}")]
    Snapshot(#[source] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Location of one artifact inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    namespace: Option<String>,
    name: String,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

impl ArtifactKey {
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        if !valid_segment(&name) {
            return Err(StorageError::InvalidKey(name));
        }
        if let Some(ns) = &namespace {
            if !valid_segment(ns) {
                return Err(StorageError::InvalidKey(ns.clone()));
            }
        }
        Ok(Self { namespace, name })
    }

    /// Parse `name` or `namespace/name`.
    pub fn from_download_path(path: &str) -> Result<Self, StorageError> {
        let trimmed = path.trim_start_matches('/');
        let mut segments = trimmed.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(name), None, None) => Self::new(None, name),
            (Some(ns), Some(name), None) => Self::new(Some(ns.to_string()), name),
            _ => Err(StorageError::InvalidKey(path.to_string())),
        }
    }

    /// Sibling artifact in the same namespace.
    pub fn sibling(&self, name: impl Into<String>) -> Result<Self, StorageError> {
        Self::new(self.namespace.clone(), name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn download_path(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }

    fn relative_path(&self) -> PathBuf {
        match &self.namespace {
            Some(ns) => Path::new(ns).join(&self.name),
            None => PathBuf::from(&self.name),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.download_path())
    }
}

/// Stores artifacts as files under a base directory.
pub struct FilesystemStore {
    base_path: PathBuf,
}

impl FilesystemStore {
    /// Create the store, creating the base directory if missing.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        tokio::fs::create_dir_all(&base_path)
            .await
            .map_err(|source| StorageError::Io {
                path: base_path.display().to_string(),
                source,
            })?;
        info!(path = %base_path.display(), "Artifact store ready");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.base_path.join(key.relative_path())
    }
}

#[async_trait]
impl ArtifactStore for FilesystemStore {
    async fn put(&self, key: &ArtifactKey, content: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let io_err = |source| StorageError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, content).await.map_err(|e| {
            error!(error = ?e, path = %path.display(), "Failed to write artifact");
            io_err(e)
        })?;
        debug!(key = %key, size = content.len(), "Stored artifact");
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.download_path()))
            }
            Err(source) => Err(StorageError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    async fn exists(&self, key: &ArtifactKey) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }
}
