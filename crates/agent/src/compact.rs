//! Compaction: turning a finished conversation into a summary request.
//!
//! Compaction is a provider round-trip. The history is rendered as plain text
//! under a summarization prompt and sent as a single user turn with no tools;
//! the reply becomes the `Summary` turn.

use stepwise_core::turn::Turn;

const SUMMARIZE_PROMPT: &str = "\
You are a context compaction assistant. Summarise the following conversation history \
in a concise, information-dense way. Preserve all technical details, decisions, file \
names, code snippets, and tool outputs that may be relevant to future work. \
The summary will replace the original history to free up context space.";

/// The single turn sent to the provider to obtain a summary of `turns`.
pub fn summary_request(turns: &[Turn]) -> Turn {
    Turn::user(format!("{SUMMARIZE_PROMPT}\n\n---\n\n{}", serialize_history(turns)))
}

/// Render turns as `Role: text` paragraphs.
pub fn serialize_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::User { text } => format!("User: {text}"),
            Turn::Summary { text } => format!("Summary: {text}"),
            Turn::Assistant { text, tool_calls } => {
                let mut parts: Vec<String> = text.iter().cloned().collect();
                parts.extend(
                    tool_calls
                        .iter()
                        .map(|c| format!("[tool_call: {}({})]", c.name, c.arguments)),
                );
                format!("Assistant: {}", parts.join(" "))
            }
            Turn::ToolResults { results } => {
                let rendered: Vec<String> = results
                    .iter()
                    .map(|r| format!("[tool_result: {}]", r.content()))
                    .collect();
                format!("Tool: {}", rendered.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::turn::{ToolCallRequest, ToolCallResult};

    #[test]
    fn history_rendering() {
        let turns = vec![
            Turn::user("create a.txt"),
            Turn::tool_calls(
                None,
                vec![ToolCallRequest::new("c1", "write_file", serde_json::json!({"path": "a.txt"}))],
            ),
            Turn::tool_results(vec![ToolCallResult::error("c1", "quota exceeded: a.txt")]),
            Turn::assistant("Could not write."),
        ];
        let text = serialize_history(&turns);
        assert!(text.starts_with("User: create a.txt"));
        assert!(text.contains(r#"[tool_call: write_file({"path":"a.txt"})]"#));
        assert!(text.contains("[tool_result: Error: quota exceeded: a.txt]"));
        assert!(text.ends_with("Assistant: Could not write."));
    }

    #[test]
    fn request_wraps_history() {
        let turn = summary_request(&[Turn::user("hello")]);
        let text = turn.text().unwrap();
        assert!(text.starts_with("You are a context compaction assistant."));
        assert!(text.ends_with("---\n\nUser: hello"));
    }
}
