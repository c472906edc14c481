//! External collaborators: the live workspace the tools act on.
//!
//! The engine never touches the filesystem, version control, or processes
//! directly; it goes through these traits, which the host provides.
//! Paths are workspace-relative strings.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Final path component
    pub name: String,
    /// Workspace-relative path
    pub path: String,
    pub is_dir: bool,
    /// Size in bytes (0 for directories)
    #[serde(default)]
    pub size: u64,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceError>;

    /// Create or overwrite a file, creating parent directories as needed.
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceError>;

    /// List a directory. Entries are returned sorted by path.
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, WorkspaceError>;

    async fn delete(&self, path: &str) -> Result<(), WorkspaceError>;

    async fn exists(&self, path: &str) -> Result<bool, WorkspaceError> {
        match self.read(path).await {
            Ok(_) => Ok(true),
            Err(WorkspaceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Working-tree state as reported by version control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
}

impl VcsStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.modified.is_empty() && self.untracked.is_empty()
    }
}

#[async_trait]
pub trait Vcs: Send + Sync {
    async fn status(&self) -> Result<VcsStatus, WorkspaceError>;

    /// Stage every change in the working tree.
    async fn stage_all(&self) -> Result<(), WorkspaceError>;

    /// Commit staged changes, returning the new commit id.
    async fn commit(&self, message: &str) -> Result<String, WorkspaceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands with its own timeout; expiry surfaces as `WorkspaceError::Timeout`.
#[async_trait]
pub trait CommandSandbox: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput, WorkspaceError>;
}

/// The bundle of collaborators a tool executes against.
#[derive(Clone)]
pub struct Workspace {
    pub files: Arc<dyn FileStore>,
    pub vcs: Arc<dyn Vcs>,
    pub sandbox: Arc<dyn CommandSandbox>,
}

impl Workspace {
    pub fn new(
        files: Arc<dyn FileStore>,
        vcs: Arc<dyn Vcs>,
        sandbox: Arc<dyn CommandSandbox>,
    ) -> Self {
        Self {
            files,
            vcs,
            sandbox,
        }
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").finish_non_exhaustive()
    }
}
