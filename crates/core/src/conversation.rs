//! Conversation store: the ordered turn history of one run.
//!
//! Enforces the request/result pairing invariant on every append: an assistant
//! turn that requests tools must be answered by exactly one result turn that
//! carries one result per call, in request order, before anything else.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::turn::Turn;

/// Default maximum number of retained turns.
pub const DEFAULT_MAX_TURNS: usize = 200;

#[derive(Debug, Clone)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    max_turns: usize,
    /// Call ids of the last tool-requesting assistant turn, until answered.
    pending: Option<Vec<String>>,
    /// Every call id seen during the store's lifetime.
    seen_ids: HashSet<String>,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(1),
            pending: None,
            seen_ids: HashSet::new(),
        }
    }

    /// Rebuild a store from existing turns, validating them in order.
    pub fn from_turns(turns: Vec<Turn>, max_turns: usize) -> Result<Self> {
        let mut store = Self::new(max_turns);
        for turn in turns {
            store.append(turn)?;
        }
        Ok(store)
    }

    /// Append a turn, enforcing the ordering invariant and the size limit.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        if self.turns.len() >= self.max_turns {
            return Err(Error::ConversationFull {
                limit: self.max_turns,
            });
        }

        match (&turn, self.pending.as_ref()) {
            (Turn::ToolResults { results }, Some(expected)) => {
                let got: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
                if got.len() != expected.len() || got.iter().zip(expected).any(|(g, e)| g != e) {
                    return Err(Error::ProtocolViolation(format!(
                        "tool results {got:?} do not match requested calls {expected:?}"
                    )));
                }
                self.pending = None;
            }
            (Turn::ToolResults { .. }, None) => {
                return Err(Error::ProtocolViolation(
                    "tool results without a preceding tool-call request".into(),
                ));
            }
            (_, Some(expected)) => {
                return Err(Error::ProtocolViolation(format!(
                    "expected results for calls {expected:?} before any further turn"
                )));
            }
            (Turn::Assistant { tool_calls, .. }, None) if !tool_calls.is_empty() => {
                let mut ids = Vec::with_capacity(tool_calls.len());
                for call in tool_calls {
                    if call.id.is_empty() {
                        return Err(Error::ProtocolViolation(format!(
                            "tool call '{}' has an empty id",
                            call.name
                        )));
                    }
                    if self.seen_ids.contains(&call.id) || ids.contains(&call.id) {
                        return Err(Error::ProtocolViolation(format!(
                            "duplicate tool call id '{}'",
                            call.id
                        )));
                    }
                    ids.push(call.id.clone());
                }
                self.seen_ids.extend(ids.iter().cloned());
                self.pending = Some(ids);
            }
            _ => {}
        }

        self.turns.push(turn);
        Ok(())
    }

    /// Replace history with `[Summary, latest user turn]`.
    ///
    /// Returns the number of turns that were folded into the summary.
    pub fn compact(&mut self, summary: impl Into<String>) -> Result<usize> {
        if let Some(expected) = &self.pending {
            return Err(Error::ProtocolViolation(format!(
                "cannot compact while calls {expected:?} await results"
            )));
        }

        let latest_user = self
            .turns
            .iter()
            .rposition(|t| matches!(t, Turn::User { .. }))
            .map(|idx| self.turns[idx].clone());

        let before = self.turns.len();
        self.turns.clear();
        self.turns.push(Turn::summary(summary));
        if let Some(user) = latest_user {
            self.turns.push(user);
        }
        Ok(before.saturating_sub(self.turns.len() - 1))
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.pending = None;
        self.seen_ids.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Whether the last tool-call request is still unanswered.
    pub fn awaiting_results(&self) -> bool {
        self.pending.is_some()
    }

    /// The most recent non-empty assistant text.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|t| match t {
            Turn::Assistant { text: Some(text), .. } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}
