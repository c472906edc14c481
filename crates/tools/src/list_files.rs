//! list_files tool: enumerate one directory.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;

pub struct ListFilesTool {
    spec: ToolSpec,
}

impl ListFilesTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "list_files",
                "List the entries of a workspace directory, sorted by path. Directories end with '/'.",
            )
            .optional(
                "path",
                ArgType::String,
                "Directory to list, relative to the workspace root (default: root)",
            )
            .idempotent(true),
        }
    }
}

impl Default for ListFilesTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let path = args.opt_str("path").unwrap_or(".");
        let entries = workspace.files.list(path).await?;

        let listed: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                if e.is_dir {
                    serde_json::json!({ "path": format!("{}/", e.path), "type": "dir" })
                } else {
                    serde_json::json!({ "path": e.path, "type": "file", "size": e.size })
                }
            })
            .collect();

        Ok(serde_json::json!({ "path": path, "entries": listed }))
    }
}
