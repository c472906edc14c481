//! Turn domain types.
//!
//! A run's conversation is an ordered sequence of turns:
//! the user's instruction, the model's replies (text and/or tool-call requests),
//! the results of executing those calls, and summaries produced by compaction.

use serde::{Deserialize, Serialize};

/// A structured request, emitted by the model, to invoke one named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call ID, unique within the run (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as sent by the model. Expected to be a JSON object;
    /// anything else is rejected by catalog validation.
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// The outcome of one tool call, in the uniform shape the model sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The call ID this result answers
    pub call_id: String,

    pub status: ToolStatus,

    /// Structured data on success, a human-readable message on error
    pub payload: serde_json::Value,
}

impl ToolCallResult {
    pub fn ok(call_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            status: ToolStatus::Ok,
            payload,
        }
    }

    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            status: ToolStatus::Error,
            payload: serde_json::Value::String(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    /// Render the payload as the text content sent back to the model.
    pub fn content(&self) -> String {
        let body = match &self.payload {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self.status {
            ToolStatus::Ok => body,
            ToolStatus::Error => format!("Error: {body}"),
        }
    }
}

/// One unit of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    ToolResults {
        results: Vec<ToolCallResult>,
    },
    Summary {
        text: String,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    /// A terminal assistant reply (no tool calls).
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant { text, tool_calls }
    }

    pub fn tool_results(results: Vec<ToolCallResult>) -> Self {
        Self::ToolResults { results }
    }

    pub fn summary(text: impl Into<String>) -> Self {
        Self::Summary { text: text.into() }
    }

    /// Whether this is an assistant turn that requests at least one tool call.
    pub fn requests_tools(&self) -> bool {
        matches!(self, Self::Assistant { tool_calls, .. } if !tool_calls.is_empty())
    }

    /// The free text carried by this turn, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { text } | Self::Summary { text } => Some(text),
            Self::Assistant { text, .. } => text.as_deref(),
            Self::ToolResults { .. } => None,
        }
    }
}
