//! Security policies for Stepwise workspaces.
//!
//! Provides:
//! - **Path validation**: confine tool file access to the workspace root
//! - **Command policy**: optional allowlist for sandboxed shell commands

pub mod command;
pub mod path;

pub use command::{CommandDenied, CommandPolicy};
pub use path::{PathValidationError, normalize_relative, resolve_in_workspace};
