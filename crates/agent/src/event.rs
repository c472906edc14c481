//! Progress events emitted by a run.
//!
//! Every run ends with exactly one terminal event (`run_completed`,
//! `run_failed`, `iteration_limit_reached` or `run_cancelled`), after which
//! the stream closes.

use serde::{Deserialize, Serialize};
use stepwise_core::artifact::Artifact;
use stepwise_core::turn::ToolCallResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A model call is about to be issued. `iteration` counts completed tool phases.
    ModelCallStarted { iteration: u32 },

    /// A validated or rejected call is about to be dispatched.
    ToolCallStarted {
        call_id: String,
        name: String,
        args: serde_json::Value,
    },

    ToolCallFinished {
        call_id: String,
        name: String,
        result: ToolCallResult,
    },

    RunCompleted {
        final_text: String,
        artifacts: Vec<Artifact>,
    },

    RunFailed {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_text: Option<String>,
        artifacts: Vec<Artifact>,
    },

    IterationLimitReached {
        iterations: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_text: Option<String>,
        artifacts: Vec<Artifact>,
    },

    RunCancelled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_text: Option<String>,
        artifacts: Vec<Artifact>,
    },
}

impl RunEvent {
    /// Stable event name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ModelCallStarted { .. } => "model_call_started",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallFinished { .. } => "tool_call_finished",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
            Self::IterationLimitReached { .. } => "iteration_limit_reached",
            Self::RunCancelled { .. } => "run_cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. }
                | Self::RunFailed { .. }
                | Self::IterationLimitReached { .. }
                | Self::RunCancelled { .. }
        )
    }
}
