//! git_status and git_commit tools.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;
use tracing::info;

pub struct GitStatusTool {
    spec: ToolSpec,
}

impl GitStatusTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "git_status",
                "Show the working-tree state: current branch plus staged, modified, and untracked files.",
            )
            .idempotent(true),
        }
    }
}

impl Default for GitStatusTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GitStatusTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        _args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let status = workspace.vcs.status().await?;
        Ok(serde_json::json!({
            "branch": status.branch,
            "clean": status.is_clean(),
            "staged": status.staged,
            "modified": status.modified,
            "untracked": status.untracked,
        }))
    }
}

pub struct GitCommitTool {
    spec: ToolSpec,
}

impl GitCommitTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "git_commit",
                "Stage every change in the working tree and commit it with the given message.",
            )
            .required("message", ArgType::String, "The commit message"),
        }
    }
}

impl Default for GitCommitTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GitCommitTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let message = args.str("message")?;
        if message.trim().is_empty() {
            return Err(ToolError::schema("message", "must not be empty"));
        }

        workspace.vcs.stage_all().await?;
        let commit_id = workspace.vcs.commit(message).await?;
        info!(commit = %commit_id, "Committed changes");

        Ok(serde_json::json!({ "commit_id": commit_id, "message": message }))
    }
}
