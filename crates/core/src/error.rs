//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is the run-level error.

use thiserror::Error;

/// The top-level error type for loop and run-lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// The provider contract was broken (malformed turn order, duplicate ids, ...).
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The conversation reached its configured maximum retained size.
    #[error("Conversation is full ({limit} turns); compact it before continuing")]
    ConversationFull { limit: usize },

    // --- Run lifecycle ---
    #[error("A run is already in progress on this loop")]
    RunInProgress,

    #[error("Run {0} is not active")]
    RunNotActive(String),

    #[error("Run {0} is still active")]
    RunActive(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Whether a provider failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Transient,
    Fatal,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Classify this error for the retry policy.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::RateLimited { .. } => {
                ProviderErrorKind::Transient
            }
            Self::ApiError { status_code, .. }
                if matches!(status_code, 408 | 429) || *status_code >= 500 =>
            {
                ProviderErrorKind::Transient
            }
            _ => ProviderErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ProviderErrorKind::Transient
    }
}

/// Failures reported by the external collaborators (file store, VCS, sandbox).
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("concurrent modification of {0}")]
    ConcurrentModification(String),

    #[error("version control is not initialized")]
    NotInitialized,

    #[error("nothing staged to commit")]
    NothingStaged,

    #[error("command timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("{0}")]
    Io(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid argument '{field}': {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

impl ToolError {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
