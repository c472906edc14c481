//! `stepwise run`: one instruction, driven to a terminal state.

use stepwise_agent::{RunEvent, RunHandle};
use stepwise_core::run::RunOutcome;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::render;
use super::session::Session;
use crate::GlobalOptions;

pub async fn run(
    instruction: String,
    options: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::build(options)?;

    println!("  Provider: {} | Model: {}", session.provider, session.run_config.model);
    println!("  Workspace: {}", session.root.display());
    println!();

    let mut handle = session.agent.start(
        instruction,
        session.catalog.clone(),
        session.run_config.clone(),
    )?;
    let outcome = drive(&mut handle).await?;

    println!();
    print!("{}", render::outcome_report(&outcome));

    if outcome.is_success() {
        Ok(())
    } else {
        Err(format!("run {} ended in state {}", outcome.run_id, outcome.state).into())
    }
}

/// Stream progress for a started run until it ends. Ctrl-C requests
/// cancellation; the run then stops at the next safe point.
pub async fn drive(handle: &mut RunHandle) -> Result<RunOutcome, Box<dyn std::error::Error>> {
    let printer = handle.events().map(|events| tokio::spawn(print_events(events)));

    let mut state = handle.watch_state();
    tokio::select! {
        _ = state.wait_for(|s| s.is_terminal()) => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n  Cancelling...");
            // Already terminal is fine: the outcome below reports it.
            let _ = handle.cancel();
        }
    }

    let outcome = handle.wait().await?;
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    Ok(outcome)
}

async fn print_events(mut events: UnboundedReceiverStream<RunEvent>) {
    while let Some(event) = events.next().await {
        if let Some(line) = render::describe_event(&event) {
            eprintln!("{line}");
        }
    }
}
