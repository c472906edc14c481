//! `stepwise chat`: each input line starts a run that continues the
//! previous run's conversation.

use std::io::Write;

use stepwise_agent::RunHandle;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::render;
use super::run::drive;
use super::session::Session;
use crate::GlobalOptions;

/// What the user asked for on one input line.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Empty,
    Exit,
    Clear,
    Compact,
    Help,
    Instruction(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/exit" | "/quit" | "exit" | "quit" => Input::Exit,
        "/clear" => Input::Clear,
        "/compact" => Input::Compact,
        "/help" => Input::Help,
        other => Input::Instruction(other),
    }
}

pub async fn run(options: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::build(options)?;

    println!();
    println!("  Stepwise interactive session");
    println!("  Provider: {} | Model: {}", session.provider, session.run_config.model);
    println!("  Workspace: {}", session.root.display());
    println!("  Type /help for commands, /exit to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<RunHandle> = None;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let instruction = match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Help => {
                print_help();
                continue;
            }
            Input::Clear => {
                last = None;
                println!("  Conversation cleared.");
                continue;
            }
            Input::Compact => {
                match last.as_mut() {
                    Some(handle) => match session.agent.compact(handle).await {
                        Ok(folded) => println!("  Folded {folded} turn(s) into a summary."),
                        Err(e) => eprintln!("  Compaction failed: {e}"),
                    },
                    None => println!("  Nothing to compact yet."),
                }
                continue;
            }
            Input::Instruction(text) => text,
        };

        let started = match last.as_mut() {
            Some(previous) => session.agent.follow_up(previous, instruction).await,
            None => session.agent.start(
                instruction,
                session.catalog.clone(),
                session.run_config.clone(),
            ),
        };
        let mut handle = match started {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("  Error: {e}");
                continue;
            }
        };

        match drive(&mut handle).await {
            Ok(outcome) => println!("\n{}", render::outcome_report(&outcome)),
            Err(e) => eprintln!("  Error: {e}"),
        }
        last = Some(handle);
    }

    println!("  Goodbye!");
    Ok(())
}

fn print_help() {
    println!("  /compact  Summarize the conversation so far to free up room");
    println!("  /clear    Start a fresh conversation");
    println!("  /exit     Leave the session");
    println!("  Ctrl-C    Cancel the current run");
}
