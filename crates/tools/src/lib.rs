//! Built-in tools and workspace collaborators for Stepwise.
//!
//! Tools give the agent the ability to act on a workspace:
//! read, write, edit, and delete files, list directories, search code,
//! inspect and commit with git, and run shell commands.
//!
//! Collaborators come in two flavours: `local` (disk, git binary, `sh -c`)
//! and `memory` (in-process, for tests and dry runs).

pub mod delete_file;
pub mod edit_file;
pub mod git;
pub mod list_files;
pub mod local;
pub mod memory;
pub mod read_file;
pub mod run_command;
pub mod search_code;
pub mod write_file;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stepwise_core::error::{ToolError, WorkspaceError};
use stepwise_core::tool::{ToolArgs, ToolCatalog};
use stepwise_core::workspace::Workspace;
use stepwise_security::{CommandPolicy, normalize_relative};

pub use local::{GitCli, LocalFileStore, ProcessSandbox};
pub use memory::{MemoryFileStore, MemoryVcs, MemoryWorkspace, ScriptedSandbox};

/// Create the catalog with every built-in tool.
///
/// `policy` restricts which commands `run_command` may execute.
pub fn default_catalog(policy: CommandPolicy) -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    catalog.register(Arc::new(read_file::ReadFileTool::new()));
    catalog.register(Arc::new(write_file::WriteFileTool::new()));
    catalog.register(Arc::new(edit_file::EditFileTool::new()));
    catalog.register(Arc::new(delete_file::DeleteFileTool::new()));
    catalog.register(Arc::new(list_files::ListFilesTool::new()));
    catalog.register(Arc::new(search_code::SearchCodeTool::new()));
    catalog.register(Arc::new(git::GitStatusTool::new()));
    catalog.register(Arc::new(git::GitCommitTool::new()));
    catalog.register(Arc::new(run_command::RunCommandTool::new(policy)));
    catalog
}

/// The `path` argument in the canonical form the file stores key on, so
/// `./a.txt` and `a.txt` name the same file in tool payloads.
pub(crate) fn path_arg(args: &ToolArgs) -> Result<String, ToolError> {
    let raw = args.str("path")?;
    normalize_relative(raw).map_err(|e| {
        WorkspaceError::InvalidPath {
            path: raw.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Settings for a workspace on the local machine.
#[derive(Debug, Clone)]
pub struct LocalWorkspaceOptions {
    pub root: PathBuf,
    pub forbidden_paths: Vec<String>,
    pub max_file_bytes: u64,
    pub command_timeout: Duration,
}

/// Build a workspace over a local directory.
pub fn local_workspace(options: &LocalWorkspaceOptions) -> Workspace {
    let files = LocalFileStore::new(&options.root)
        .with_forbidden_paths(options.forbidden_paths.clone())
        .with_max_file_bytes(options.max_file_bytes);
    Workspace::new(
        Arc::new(files),
        Arc::new(GitCli::new(&options.root)),
        Arc::new(ProcessSandbox::new(&options.root, options.command_timeout)),
    )
}
