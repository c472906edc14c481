use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use stepwise_core::error::WorkspaceError;
use stepwise_core::workspace::{Vcs, VcsStatus};
use tokio::process::Command;
use tracing::debug;

/// Version control through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<Output, WorkspaceError> {
        debug!(?args, "Running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| WorkspaceError::Io(format!("failed to run git: {e}")))
    }

    async fn ensure_repo(&self) -> Result<(), WorkspaceError> {
        let output = self.git(&["rev-parse", "--is-inside-work-tree"]).await?;
        if output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true" {
            Ok(())
        } else {
            Err(WorkspaceError::NotInitialized)
        }
    }

    async fn checked(&self, args: &[&str]) -> Result<String, WorkspaceError> {
        let output = self.git(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkspaceError::Io(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn status(&self) -> Result<VcsStatus, WorkspaceError> {
        self.ensure_repo().await?;
        let stdout = self.checked(&["status", "--porcelain=v1", "-b"]).await?;
        Ok(parse_porcelain_status(&stdout))
    }

    async fn stage_all(&self) -> Result<(), WorkspaceError> {
        self.ensure_repo().await?;
        self.checked(&["add", "-A"]).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> Result<String, WorkspaceError> {
        self.ensure_repo().await?;

        // `diff --cached --quiet` exits 0 when the index matches HEAD.
        let diff = self.git(&["diff", "--cached", "--quiet"]).await?;
        if diff.status.success() {
            return Err(WorkspaceError::NothingStaged);
        }

        self.checked(&["commit", "-m", message]).await?;
        let id = self.checked(&["rev-parse", "HEAD"]).await?;
        Ok(id.trim().to_string())
    }
}

/// Parse `git status --porcelain=v1 -b` output.
pub fn parse_porcelain_status(output: &str) -> VcsStatus {
    let mut status = VcsStatus::default();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            status.branch = parse_branch(header);
            continue;
        }
        if line.len() < 4 {
            continue;
        }
        let (code, path) = line.split_at(3);
        let mut flags = code.chars();
        let index = flags.next().unwrap_or(' ');
        let worktree = flags.next().unwrap_or(' ');
        // Renames are reported as "old -> new".
        let path = path
            .rsplit_once(" -> ")
            .map_or(path, |(_, new)| new)
            .trim_matches('"')
            .to_string();

        if index == '?' && worktree == '?' {
            status.untracked.push(path);
            continue;
        }
        if index != ' ' {
            status.staged.push(path.clone());
        }
        if worktree != ' ' {
            status.modified.push(path);
        }
    }

    status
}

fn parse_branch(header: &str) -> Option<String> {
    if header.starts_with("HEAD (no branch)") {
        return None;
    }
    let header = header
        .strip_prefix("No commits yet on ")
        .or_else(|| header.strip_prefix("Initial commit on "))
        .unwrap_or(header);
    let name = header.split("...").next().unwrap_or(header);
    let name = name.split(' ').next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}
