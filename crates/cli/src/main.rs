//! Stepwise CLI: the main entry point.
//!
//! Commands:
//! - `run`     Run one instruction against the workspace
//! - `chat`    Interactive session; each line continues the conversation
//! - `tools`   List the tool catalog
//! - `config`  Show, initialize, or validate configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: a bounded, auditable coding agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    options: GlobalOptions,
}

/// Overrides that apply to every command that starts runs.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GlobalOptions {
    /// Workspace root (defaults to `workspace.root` from config)
    #[arg(short, long, global = true, env = "STEPWISE_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Model identifier, overriding the configured default
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Maximum tool-execution iterations per run
    #[arg(long, global = true)]
    pub max_iterations: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single instruction to completion
    Run {
        /// The instruction, e.g. "add a README section about configuration"
        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,
    },

    /// Start an interactive session
    Chat,

    /// List the tools available to the agent
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { instruction } => {
            commands::run::run(instruction.join(" "), &cli.options).await?
        }
        Commands::Chat => commands::chat::run(&cli.options).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
