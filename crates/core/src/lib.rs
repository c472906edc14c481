//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise tool-execution
//! engine. This crate has no I/O of its own: it defines the model that the
//! provider, tool, and agent crates implement against.
//!
//! ## Layout
//!
//! - `turn` / `conversation`: the ordered, invariant-checked turn history
//! - `provider`: the abstract `send` contract over model backends
//! - `tool`: typed tool schemas, the catalog, and the executor
//! - `workspace`: host-provided file store, VCS, and command sandbox
//! - `artifact`: the ledger of effects a run produced
//! - `run`: run identity, lifecycle state, configuration, and outcome

pub mod artifact;
pub mod conversation;
pub mod error;
pub mod provider;
pub mod run;
pub mod tool;
pub mod turn;
pub mod workspace;

// Re-export key types at crate root for ergonomics
pub use artifact::{Artifact, ArtifactKind, ArtifactTracker};
pub use conversation::ConversationStore;
pub use error::{
    Error, ProviderError, ProviderErrorKind, Result, ToolError, WorkspaceError,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use run::{RunConfig, RunId, RunOutcome, RunState};
pub use tool::{ArgType, Tool, ToolArgs, ToolCatalog, ToolExecutor, ToolSpec};
pub use turn::{ToolCallRequest, ToolCallResult, ToolStatus, Turn};
pub use workspace::{CommandOutput, CommandSandbox, DirEntry, FileStore, Vcs, VcsStatus, Workspace};
