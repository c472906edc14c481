//! search_code tool: regex search across workspace files.
//!
//! Walks the file store breadth-first from `path`, so it works the same over
//! the local disk and the in-memory store.

use std::collections::VecDeque;

use async_trait::async_trait;
use regex::RegexBuilder;
use stepwise_core::error::{ToolError, WorkspaceError};
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolSpec};
use stepwise_core::workspace::Workspace;
use tracing::debug;

const DEFAULT_MAX_RESULTS: usize = 100;
/// Files larger than this are skipped.
const MAX_SEARCH_FILE_BYTES: u64 = 1024 * 1024;
const MAX_LINE_CHARS: usize = 240;

pub struct SearchCodeTool {
    spec: ToolSpec,
}

impl SearchCodeTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "search_code",
                "Search workspace files for a regular expression (e.g. 'fn\\s+main', 'TODO'). \
                 Returns matching lines with file path and 1-based line number.",
            )
            .required("pattern", ArgType::String, "Regular expression to search for")
            .optional(
                "path",
                ArgType::String,
                "Directory or file to search in (default: workspace root)",
            )
            .optional(
                "case_sensitive",
                ArgType::Boolean,
                "Case-sensitive search (default true)",
            )
            .optional(
                "fixed_string",
                ArgType::Boolean,
                "Treat the pattern as literal text (default false)",
            )
            .optional(
                "max_results",
                ArgType::Integer,
                "Maximum number of matches to return (default 100)",
            )
            .idempotent(true),
        }
    }
}

impl Default for SearchCodeTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect every file path under `root`, sorted.
async fn walk(workspace: &Workspace, root: &str) -> Result<Vec<String>, WorkspaceError> {
    let mut files = Vec::new();
    let mut queue = VecDeque::from([root.to_string()]);

    while let Some(dir) = queue.pop_front() {
        let entries = match workspace.files.list(&dir).await {
            Ok(entries) => entries,
            // A file was named directly: search just that file.
            Err(WorkspaceError::InvalidPath { .. }) if dir == root => {
                files.push(root.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };
        for entry in entries {
            if entry.is_dir {
                queue.push_back(entry.path);
            } else if entry.size <= MAX_SEARCH_FILE_BYTES {
                files.push(entry.path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn clip(line: &str) -> String {
    let trimmed = line.trim_end();
    if trimmed.chars().count() <= MAX_LINE_CHARS {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(MAX_LINE_CHARS).collect();
    clipped.push_str("...");
    clipped
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        workspace: &Workspace,
    ) -> Result<serde_json::Value, ToolError> {
        let pattern = args.str("pattern")?;
        let root = args.opt_str("path").unwrap_or(".");
        let case_sensitive = args.opt_bool("case_sensitive").unwrap_or(true);
        let fixed_string = args.opt_bool("fixed_string").unwrap_or(false);
        let max_results = args
            .opt_u64("max_results")
            .map_or(DEFAULT_MAX_RESULTS, |n| n.max(1) as usize);

        let source = if fixed_string {
            regex::escape(pattern)
        } else {
            pattern.to_string()
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| ToolError::schema("pattern", format!("invalid regex: {e}")))?;

        let files = walk(workspace, root).await?;
        debug!(pattern, files = files.len(), "Searching workspace");

        let mut matches = Vec::new();
        let mut truncated = false;
        'files: for path in &files {
            let bytes = match workspace.files.read(path).await {
                Ok(bytes) => bytes,
                Err(WorkspaceError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            // Binary files are skipped.
            let Ok(text) = std::str::from_utf8(&bytes) else {
                continue;
            };
            for (idx, line) in text.lines().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                if matches.len() == max_results {
                    truncated = true;
                    break 'files;
                }
                matches.push(serde_json::json!({
                    "path": path,
                    "line": idx + 1,
                    "text": clip(line),
                }));
            }
        }

        Ok(serde_json::json!({
            "matches": matches,
            "truncated": truncated,
        }))
    }
}
