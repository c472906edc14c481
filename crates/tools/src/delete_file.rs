//! delete_file tool.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;

pub struct DeleteFileTool {
    spec: ToolSpec,
}

impl DeleteFileTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new("delete_file", "Delete a single file from the workspace.")
                .required("path", ArgType::String, "The file to delete"),
        }
    }
}

impl Default for DeleteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let path = crate::path_arg(args)?;
        workspace.files.delete(&path).await?;
        Ok(serde_json::json!({ "path": path, "deleted": true }))
    }
}
