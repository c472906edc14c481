//! run_command tool: execute a shell command in the command sandbox.
//!
//! Supports command allowlisting; the sandbox enforces its own timeout.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;
use stepwise_security::CommandPolicy;
use tracing::debug;

/// Output longer than this is truncated (keeping the tail).
const MAX_OUTPUT_CHARS: usize = 16 * 1024;

pub struct RunCommandTool {
    spec: ToolSpec,
    policy: CommandPolicy,
}

impl RunCommandTool {
    pub fn new(policy: CommandPolicy) -> Self {
        Self {
            spec: ToolSpec::new(
                "run_command",
                "Run a shell command in the workspace root and return stdout, stderr, and the exit \
                 code. Use it for builds, tests, and formatters.",
            )
            .required("command", ArgType::String, "The shell command to execute"),
            policy,
        }
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new(CommandPolicy::allow_all())
    }
}

/// Keep the last `MAX_OUTPUT_CHARS` characters; errors usually sit at the end.
fn tail(text: &str) -> String {
    let count = text.chars().count();
    if count <= MAX_OUTPUT_CHARS {
        return text.to_string();
    }
    let kept: String = text.chars().skip(count - MAX_OUTPUT_CHARS).collect();
    format!("[... {} characters truncated]\n{kept}", count - MAX_OUTPUT_CHARS)
}

#[async_trait]
impl Tool for RunCommandTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let command = args.str("command")?;

        self.policy
            .check(command)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: "run_command".into(),
                reason: e.to_string(),
            })?;

        debug!(command = %command, "Dispatching command to sandbox");
        let output = workspace.sandbox.run(command).await?;

        if !output.success() {
            let stderr = tail(output.stderr.trim());
            let stdout = tail(output.stdout.trim());
            return Err(ToolError::ExecutionFailed {
                tool_name: "run_command".into(),
                reason: format!(
                    "exit code {}\n[stdout]\n{stdout}\n[stderr]\n{stderr}",
                    output.exit_code
                ),
            });
        }

        Ok(serde_json::json!({
            "stdout": tail(&output.stdout),
            "stderr": tail(&output.stderr),
            "exit_code": output.exit_code,
        }))
    }
}
