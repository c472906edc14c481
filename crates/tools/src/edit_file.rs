//! edit_file tool: exact-text replacement with a line diff summary.

use async_trait::async_trait;
use similar::{ChangeTag, TextDiff};
use stepwise_core::error::{ToolError, WorkspaceError};
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;
use tracing::debug;

pub struct EditFileTool {
    spec: ToolSpec,
}

impl EditFileTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "edit_file",
                "Replace an exact piece of text in an existing file. `old_text` must match exactly \
                 once (including whitespace) unless `replace_all` is true. Read the file first.",
            )
            .required("path", ArgType::String, "The file to edit")
            .required("old_text", ArgType::String, "Exact text to replace")
            .required("new_text", ArgType::String, "Replacement text")
            .optional(
                "replace_all",
                ArgType::Boolean,
                "Replace every occurrence instead of exactly one (default false)",
            ),
        }
    }
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "edit_file".into(),
        reason,
    }
}

/// Count added and removed lines between two texts.
fn line_changes(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(added, removed), change| match change.tag() {
            ChangeTag::Insert => (added + 1, removed),
            ChangeTag::Delete => (added, removed + 1),
            ChangeTag::Equal => (added, removed),
        })
}

#[async_trait]
impl Tool for EditFileTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let path = crate::path_arg(args)?;
        let path = path.as_str();
        let old_text = args.str("old_text")?;
        let new_text = args.str("new_text")?;
        let replace_all = args.opt_bool("replace_all").unwrap_or(false);

        if old_text.is_empty() {
            return Err(ToolError::schema("old_text", "must not be empty"));
        }

        let original_bytes = workspace.files.read(path).await?;
        let original = String::from_utf8(original_bytes.clone())
            .map_err(|_| failed(format!("'{path}' is not valid UTF-8 text")))?;

        let occurrences = original.matches(old_text).count();
        let updated = match occurrences {
            0 => return Err(failed(format!("old_text not found in {path}"))),
            1 => original.replacen(old_text, new_text, 1),
            n if replace_all => {
                debug!(path, occurrences = n, "Replacing all occurrences");
                original.replace(old_text, new_text)
            }
            n => {
                return Err(failed(format!(
                    "old_text occurs {n} times in {path}; add surrounding context or set replace_all"
                )));
            }
        };

        // Re-read right before writing; someone else may have touched the file.
        let current = workspace.files.read(path).await?;
        if current != original_bytes {
            return Err(WorkspaceError::ConcurrentModification(path.to_string()).into());
        }
        workspace.files.write(path, updated.as_bytes()).await?;

        let (added, removed) = line_changes(&original, &updated);
        Ok(serde_json::json!({
            "path": path,
            "replacements": occurrences,
            "lines_added": added,
            "lines_removed": removed,
            "summary": format!("+{added} -{removed}"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryFileStore, MemoryWorkspace, ScriptedSandbox};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stepwise_core::workspace::{DirEntry, FileStore};

    fn args(value: serde_json::Value) -> ToolArgs {
        EditFileTool::new().spec().validate(&value).unwrap()
    }

    #[tokio::test]
    async fn replaces_single_occurrence() {
        let ws = MemoryWorkspace::new();
        ws.files.insert("src/lib.rs", "fn a() {}\nfn b() {}\n");

        let out = EditFileTool::new()
            .execute(
                &args(json!({"path": "src/lib.rs", "old_text": "fn b() {}", "new_text": "fn b() { a() }"})),
                &ws.workspace(),
            )
            .await
            .unwrap();

        assert_eq!(out["replacements"], json!(1));
        assert_eq!(out["summary"], json!("+1 -1"));
        assert_eq!(
            ws.files.get_string("src/lib.rs").as_deref(),
            Some("fn a() {}\nfn b() { a() }\n")
        );
    }

    #[tokio::test]
    async fn ambiguous_match_rejected() {
        let ws = MemoryWorkspace::new();
        ws.files.insert("a.txt", "x\nx\n");
        let err = EditFileTool::new()
            .execute(
                &args(json!({"path": "a.txt", "old_text": "x", "new_text": "y"})),
                &ws.workspace(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("occurs 2 times"));
        assert_eq!(ws.files.get_string("a.txt").as_deref(), Some("x\nx\n"));
    }

    #[tokio::test]
    async fn replace_all_rewrites_every_occurrence() {
        let ws = MemoryWorkspace::new();
        ws.files.insert("a.txt", "x\nx\nz\n");
        let out = EditFileTool::new()
            .execute(
                &args(json!({"path": "a.txt", "old_text": "x", "new_text": "y", "replace_all": true})),
                &ws.workspace(),
            )
            .await
            .unwrap();
        assert_eq!(out["replacements"], json!(2));
        assert_eq!(out["summary"], json!("+2 -2"));
        assert_eq!(ws.files.get_string("a.txt").as_deref(), Some("y\ny\nz\n"));
    }

    #[tokio::test]
    async fn missing_text_and_missing_file() {
        let ws = MemoryWorkspace::new();
        ws.files.insert("a.txt", "hello");
        let tool = EditFileTool::new();

        let err = tool
            .execute(
                &args(json!({"path": "a.txt", "old_text": "bye", "new_text": "x"})),
                &ws.workspace(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found in a.txt"));

        let err = tool
            .execute(
                &args(json!({"path": "b.txt", "old_text": "a", "new_text": "b"})),
                &ws.workspace(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not found: b.txt");
    }

    /// Returns different content on every read to simulate a concurrent writer.
    struct ChangingStore {
        reads: AtomicUsize,
        inner: MemoryFileStore,
    }

    #[async_trait]
    impl FileStore for ChangingStore {
        async fn read(&self, _path: &str) -> Result<Vec<u8>, WorkspaceError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("value = {n}\n").into_bytes())
        }
        async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceError> {
            self.inner.write(path, bytes).await
        }
        async fn list(&self, path: &str) -> Result<Vec<DirEntry>, WorkspaceError> {
            self.inner.list(path).await
        }
        async fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
            self.inner.delete(path).await
        }
    }

    #[tokio::test]
    async fn concurrent_modification_detected() {
        let files = Arc::new(ChangingStore {
            reads: AtomicUsize::new(0),
            inner: MemoryFileStore::new(),
        });
        let workspace = Workspace::new(
            files.clone(),
            Arc::new(crate::memory::MemoryVcs::uninitialized()),
            Arc::new(ScriptedSandbox::new()),
        );

        let err = EditFileTool::new()
            .execute(
                &args(json!({"path": "cfg.toml", "old_text": "value", "new_text": "v"})),
                &workspace,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "concurrent modification of cfg.toml");
        assert!(files.inner.is_empty());
    }

    #[test]
    fn line_change_counts() {
        assert_eq!(line_changes("a\nb\n", "a\nb\nc\n"), (1, 0));
        assert_eq!(line_changes("a\nb\n", "a\n"), (0, 1));
    }
}
