//! read_file tool: return the text of a workspace file.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;

pub struct ReadFileTool {
    spec: ToolSpec,
}

impl ReadFileTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "read_file",
                "Read the full text of a file in the workspace. Paths are relative to the workspace root.",
            )
            .required("path", ArgType::String, "The file path to read")
            .idempotent(true),
        }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let path = args.str("path")?;
        let bytes = workspace.files.read(path).await?;
        let text = String::from_utf8(bytes).map_err(|_| ToolError::ExecutionFailed {
            tool_name: "read_file".into(),
            reason: format!("'{path}' is not valid UTF-8 text"),
        })?;
        Ok(serde_json::Value::String(text))
    }
}
