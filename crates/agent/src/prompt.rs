//! Built-in system prompt for coding runs.

use stepwise_core::tool::ToolCatalog;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Stepwise, a careful software engineering agent working inside a single \
project workspace. Complete the user's instruction by calling the available tools. \
Paths are relative to the workspace root.

Guidelines:
- Inspect before you change: list or read files before editing them.
- Prefer edit_file for small changes to existing files and write_file for new files.
- When a tool returns an error, read the message and adjust; do not repeat the same call.
- Keep changes minimal and focused on the instruction.
- When the work is done, reply with a short summary of what changed and no tool calls.";

/// The system prompt for a run: the override if one is configured, otherwise
/// the built-in prompt followed by the catalog's tool names.
pub fn system_prompt(override_prompt: Option<&str>, catalog: &ToolCatalog) -> String {
    if let Some(prompt) = override_prompt {
        return prompt.to_string();
    }
    if catalog.is_empty() {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    }
    format!(
        "{DEFAULT_SYSTEM_PROMPT}\n\nAvailable tools: {}.",
        catalog.names().join(", ")
    )
}
