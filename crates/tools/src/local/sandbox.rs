use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use stepwise_core::error::WorkspaceError;
use stepwise_core::workspace::{CommandOutput, CommandSandbox};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands through the platform shell inside the workspace root.
///
/// The child is killed when the timeout expires.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    root: PathBuf,
    timeout: Duration,
}

impl ProcessSandbox {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CommandSandbox for ProcessSandbox {
    async fn run(&self, command: &str) -> Result<CommandOutput, WorkspaceError> {
        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        };
        cmd.current_dir(&self.root).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(WorkspaceError::Io(format!("failed to spawn: {e}"))),
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(WorkspaceError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!(command = %command, exit_code, "Command failed");
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}
