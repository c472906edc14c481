//! Artifact ledger: what a run changed in the workspace.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::turn::ToolCallResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Created,
    Modified,
    Deleted,
    Executed,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Executed => "executed",
        };
        f.write_str(s)
    }
}

/// One recorded side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Workspace path, or the literal command / commit message for `executed`
    pub target: String,
    pub kind: ArtifactKind,
    /// Iteration in which the effect was first observed
    pub first_seen_iteration: u32,
}

/// Accumulates a deduplicated ledger of effects from successful tool results.
///
/// At most one entry exists per (target, kind). A path first written as new
/// stays `created` for the rest of the run even if later edits land on it.
#[derive(Debug, Clone, Default)]
pub struct ArtifactTracker {
    entries: Vec<Artifact>,
    /// Whether each written path existed when the run started.
    existed_at_start: HashMap<String, bool>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one tool outcome. Failed results record nothing.
    pub fn record(
        &mut self,
        tool_name: &str,
        args: &serde_json::Value,
        result: &ToolCallResult,
        iteration: u32,
    ) {
        if !result.is_ok() {
            return;
        }

        match tool_name {
            "write_file" | "edit_file" => {
                let Some(path) = target_path(args, result) else {
                    return;
                };
                // Only write_file can bring a file into existence; edit_file needs one.
                let newly_created = tool_name == "write_file"
                    && result
                        .payload
                        .get("created")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                let existed = *self
                    .existed_at_start
                    .entry(path.to_string())
                    .or_insert(!newly_created);
                let kind = if existed {
                    ArtifactKind::Modified
                } else {
                    ArtifactKind::Created
                };
                self.insert(path, kind, iteration);
            }
            "delete_file" => {
                if let Some(path) = target_path(args, result) {
                    self.existed_at_start.entry(path.to_string()).or_insert(true);
                    self.insert(path, ArtifactKind::Deleted, iteration);
                }
            }
            "git_commit" => {
                if let Some(message) = arg_str(args, "message") {
                    self.insert(message, ArtifactKind::Executed, iteration);
                }
            }
            "run_command" => {
                if let Some(command) = arg_str(args, "command") {
                    self.insert(command, ArtifactKind::Executed, iteration);
                }
            }
            _ => {}
        }
    }

    fn insert(&mut self, target: &str, kind: ArtifactKind, iteration: u32) {
        if self
            .entries
            .iter()
            .any(|a| a.target == target && a.kind == kind)
        {
            return;
        }
        self.entries.push(Artifact {
            target: target.to_string(),
            kind,
            first_seen_iteration: iteration,
        });
    }

    /// The ledger, in order of first observation.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.entries
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn arg_str<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// The file a result touched. File tools report the normalized path in their
/// payload; the raw argument is the fallback.
fn target_path<'a>(args: &'a serde_json::Value, result: &'a ToolCallResult) -> Option<&'a str> {
    arg_str(&result.payload, "path").or_else(|| arg_str(args, "path"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn written(created: bool) -> ToolCallResult {
        ToolCallResult::ok(
            "c",
            json!({"path": "a.txt", "bytes_written": 2, "created": created}),
        )
    }

    #[test]
    fn new_file_is_created() {
        let mut tracker = ArtifactTracker::new();
        tracker.record("write_file", &json!({"path": "a.txt", "content": "hi"}), &written(true), 0);
        assert_eq!(
            tracker.artifacts(),
            &[Artifact {
                target: "a.txt".into(),
                kind: ArtifactKind::Created,
                first_seen_iteration: 0,
            }]
        );
    }

    #[test]
    fn existing_file_is_modified() {
        let mut tracker = ArtifactTracker::new();
        tracker.record("write_file", &json!({"path": "a.txt"}), &written(false), 1);
        assert_eq!(tracker.artifacts()[0].kind, ArtifactKind::Modified);
    }

    #[test]
    fn created_is_not_downgraded_by_later_writes() {
        let mut tracker = ArtifactTracker::new();
        let args = json!({"path": "a.txt"});
        tracker.record("write_file", &args, &written(true), 0);
        tracker.record("write_file", &args, &written(false), 1);
        tracker.record(
            "edit_file",
            &args,
            &ToolCallResult::ok("c", json!({"replacements": 1})),
            2,
        );
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.artifacts()[0].kind, ArtifactKind::Created);
        assert_eq!(tracker.artifacts()[0].first_seen_iteration, 0);
    }

    #[test]
    fn path_spellings_coalesce_on_reported_path() {
        let mut tracker = ArtifactTracker::new();
        tracker.record("write_file", &json!({"path": "a.txt"}), &written(true), 0);
        tracker.record("write_file", &json!({"path": "./a.txt"}), &written(false), 1);
        assert_eq!(
            tracker.artifacts(),
            &[Artifact {
                target: "a.txt".into(),
                kind: ArtifactKind::Created,
                first_seen_iteration: 0,
            }]
        );
    }

    #[test]
    fn recording_twice_is_idempotent() {
        let mut tracker = ArtifactTracker::new();
        let args = json!({"path": "src/lib.rs"});
        let result = ToolCallResult::ok("c", json!({"replacements": 1}));
        tracker.record("edit_file", &args, &result, 0);
        tracker.record("edit_file", &args, &result, 3);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.artifacts()[0].kind, ArtifactKind::Modified);
    }

    #[test]
    fn failed_results_record_nothing() {
        let mut tracker = ArtifactTracker::new();
        tracker.record(
            "write_file",
            &json!({"path": "a.txt"}),
            &ToolCallResult::error("c", "quota exceeded: a.txt"),
            0,
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn deletes_and_commands_are_tracked() {
        let mut tracker = ArtifactTracker::new();
        let ok = ToolCallResult::ok("c", json!({}));
        tracker.record("delete_file", &json!({"path": "old.rs"}), &ok, 0);
        tracker.record("run_command", &json!({"command": "cargo fmt"}), &ok, 1);
        tracker.record("git_commit", &json!({"message": "tidy"}), &ok, 2);
        tracker.record("read_file", &json!({"path": "a.txt"}), &ok, 2);

        let kinds: Vec<_> = tracker
            .artifacts()
            .iter()
            .map(|a| (a.target.as_str(), a.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("old.rs", ArtifactKind::Deleted),
                ("cargo fmt", ArtifactKind::Executed),
                ("tidy", ArtifactKind::Executed),
            ]
        );
    }

    #[test]
    fn artifact_serializes_lowercase_kind() {
        let artifact = Artifact {
            target: "a.txt".into(),
            kind: ArtifactKind::Created,
            first_seen_iteration: 0,
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "created");
    }
}
