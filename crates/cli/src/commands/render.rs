//! Terminal rendering of run progress and outcomes.

use stepwise_agent::RunEvent;
use stepwise_core::run::{RunOutcome, RunState};

const ARGS_PREVIEW_CHARS: usize = 80;

/// One progress line for an event, or `None` for terminal events
/// (those are reported from the outcome).
pub fn describe_event(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::ModelCallStarted { iteration } => {
            Some(format!("  [step {}] thinking...", iteration + 1))
        }
        RunEvent::ToolCallStarted { name, args, .. } => {
            Some(format!("  -> {name} {}", preview_args(args)))
        }
        RunEvent::ToolCallFinished { result, .. } => Some(if result.is_ok() {
            "     ok".to_string()
        } else {
            format!("     {}", first_line(&result.content()))
        }),
        _ => None,
    }
}

/// Compact JSON, clipped for a single line.
pub fn preview_args(args: &serde_json::Value) -> String {
    let raw = args.to_string();
    if raw.chars().count() <= ARGS_PREVIEW_CHARS {
        return raw;
    }
    let clipped: String = raw.chars().take(ARGS_PREVIEW_CHARS).collect();
    format!("{clipped}...")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Multi-line end-of-run summary.
pub fn outcome_report(outcome: &RunOutcome) -> String {
    let mut out = String::new();

    let headline = match outcome.state {
        RunState::Completed => "Completed".to_string(),
        RunState::Failed => format!(
            "Failed: {}",
            outcome.failure.as_deref().unwrap_or("unknown error")
        ),
        RunState::IterationLimitReached => format!(
            "Stopped after {} iterations without finishing",
            outcome.iterations
        ),
        RunState::Cancelled => "Cancelled".to_string(),
        other => format!("Ended in state {other}"),
    };
    out.push_str(&format!("  {headline}\n"));

    let text = outcome
        .final_text
        .as_deref()
        .or(outcome.last_assistant_text.as_deref());
    if let Some(text) = text {
        out.push('\n');
        for line in text.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }

    if !outcome.artifacts.is_empty() {
        out.push_str("\n  Changes:\n");
        for artifact in &outcome.artifacts {
            out.push_str(&format!("    {:<9} {}\n", artifact.kind.to_string(), artifact.target));
        }
    }

    out.push_str(&format!(
        "\n  {} iteration(s), {} tokens\n",
        outcome.iterations, outcome.usage.total_tokens
    ));
    out
}
