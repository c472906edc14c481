//! Run identity, lifecycle state, configuration, and outcome.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::Artifact;
use crate::provider::Usage;

/// Unique identifier for one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a run.
///
/// `Idle -> AwaitingModel -> (ExecutingTools -> AwaitingModel)* -> terminal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    AwaitingModel,
    ExecutingTools,
    Completed,
    Failed,
    IterationLimitReached,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::IterationLimitReached | Self::Cancelled
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingTools => "executing_tools",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::IterationLimitReached => "iteration_limit_reached",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Per-run loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Model turns allowed before the run stops with `IterationLimitReached`
    pub max_iterations: u32,
    /// Per-attempt provider timeout
    pub provider_timeout: Duration,
    /// Total provider attempts per model call (first try included)
    pub retry_attempts: u32,
    /// Backoff before retry `n` is `retry_base_delay * 2^n`
    pub retry_base_delay: Duration,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_conversation_turns: usize,
    pub system_prompt: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            provider_timeout: Duration::from_millis(120_000),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            model: String::new(),
            temperature: 0.2,
            max_tokens: Some(4096),
            max_conversation_turns: crate::conversation::DEFAULT_MAX_TURNS,
            system_prompt: None,
        }
    }
}

impl RunConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Everything a caller needs to summarize a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    /// Always terminal
    pub state: RunState,
    /// Completed model-then-tools cycles
    pub iterations: u32,
    /// Terminal assistant text, set only for `Completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
    /// Most recent assistant text seen during the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assistant_text: Option<String>,
    pub artifacts: Vec<Artifact>,
    /// Failure reason, set only for `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::AwaitingModel.is_terminal());
        assert!(!RunState::ExecutingTools.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::IterationLimitReached.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
    }

    #[test]
    fn default_config_matches_documented_limits() {
        let config = RunConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&RunState::IterationLimitReached).unwrap();
        assert_eq!(json, r#""iteration_limit_reached""#);
    }
}
