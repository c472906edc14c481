use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stepwise_core::error::WorkspaceError;
use stepwise_core::workspace::{DirEntry, FileStore};
use stepwise_security::{PathValidationError, normalize_relative, resolve_in_workspace};
use tracing::debug;

/// A file store over a directory on disk.
///
/// Every path is confined to `root`; forbidden subtrees are neither readable
/// nor listed.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    forbidden_paths: Vec<String>,
    max_file_bytes: u64,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            forbidden_paths: vec![".git".into()],
            max_file_bytes: 10 * 1024 * 1024,
        }
    }

    pub fn with_forbidden_paths(mut self, forbidden_paths: Vec<String>) -> Self {
        self.forbidden_paths = forbidden_paths;
        self
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        resolve_in_workspace(&self.root, path, &self.forbidden_paths).map_err(|e| match e {
            PathValidationError::CanonicalizeFailed { reason, .. } => WorkspaceError::Io(reason),
            other => WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: other.to_string(),
            },
        })
    }

    fn is_forbidden(&self, relative: &str) -> bool {
        self.forbidden_paths.iter().any(|f| {
            let f = f.trim_end_matches('/');
            relative == f || relative.starts_with(&format!("{f}/"))
        })
    }
}

fn io_error(path: &str, e: std::io::Error) -> WorkspaceError {
    match e.kind() {
        ErrorKind::NotFound => WorkspaceError::NotFound(path.to_string()),
        _ => WorkspaceError::Io(format!("{path}: {e}")),
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceError> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "is a directory".into(),
            });
        }
        tokio::fs::read(&full).await.map_err(|e| io_error(path, e))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceError> {
        if bytes.len() as u64 > self.max_file_bytes {
            return Err(WorkspaceError::QuotaExceeded(format!(
                "{path} ({} bytes, limit {})",
                bytes.len(),
                self.max_file_bytes
            )));
        }
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "is a directory".into(),
            });
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        debug!(path, bytes = bytes.len(), "Writing file");
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, WorkspaceError> {
        let full = self.resolve(path)?;
        let relative = normalize_relative(path).unwrap_or_default();
        if full.is_file() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "not a directory".into(),
            });
        }

        let mut dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| io_error(path, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_error(path, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let entry_path = if relative.is_empty() {
                name.clone()
            } else {
                format!("{relative}/{name}")
            };
            if self.is_forbidden(&entry_path) {
                continue;
            }
            let metadata = entry.metadata().await.map_err(|e| io_error(&entry_path, e))?;
            entries.push(DirEntry {
                name,
                path: entry_path,
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "is a directory".into(),
            });
        }
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn exists(&self, path: &str) -> Result<bool, WorkspaceError> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| io_error(path, e))
    }
}
