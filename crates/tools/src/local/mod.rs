//! Workspace collaborators backed by the local machine.

mod fs;
mod git;
mod sandbox;

pub use fs::LocalFileStore;
pub use git::{GitCli, parse_porcelain_status};
pub use sandbox::ProcessSandbox;
