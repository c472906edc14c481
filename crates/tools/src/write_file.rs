//! write_file tool: create or overwrite a workspace file.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;

pub struct WriteFileTool {
    spec: ToolSpec,
}

impl WriteFileTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "write_file",
                "Create a file or overwrite it completely. Parent directories are created as needed.",
            )
            .required("path", ArgType::String, "The file path to write")
            .required("content", ArgType::String, "The full new content of the file")
            .idempotent(true),
        }
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let path = crate::path_arg(args)?;
        let content = args.str("content")?;

        let existed = workspace.files.exists(&path).await?;
        workspace.files.write(&path, content.as_bytes()).await?;

        Ok(serde_json::json!({
            "path": path,
            "bytes_written": content.len(),
            "created": !existed,
        }))
    }
}
