//! Simserver CLI
//!
//! Main entry point for the simserver command-line tool.
//! Each invocation opens a session from the workspace, applies one
//! operation and writes the session back.

mod commands;
mod documents;

use clap::{Parser, Subcommand};
use commands::{
    BufferCommand, DebugModelCommand, DeleteCommand, DropCommand, FindCommand, IndexCommand,
    OptimizeCommand, StatusCommand, TrainCommand,
};
use simserver_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Simserver - document similarity index
#[derive(Parser, Debug)]
#[command(name = "simserver")]
#[command(about = "Stateful document similarity index", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SIMSERVER_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SIMSERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Session (named index) to operate on
    #[arg(short, long, global = true, env = "SIMSERVER_SESSION")]
    session: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the session's engine status
    Status(StatusCommand),

    /// Add documents to the upload buffer
    Buffer(BufferCommand),

    /// Train a model on the upload buffer or a corpus file
    Train(TrainCommand),

    /// Embed and index documents
    Index(IndexCommand),

    /// Remove documents from the index
    Delete(DeleteCommand),

    /// Precompute neighbour lists for every indexed document
    Optimize(OptimizeCommand),

    /// Find documents similar to an indexed id or ad-hoc text
    Find(FindCommand),

    /// Remove all indexed documents
    Drop(DropCommand),

    /// Describe the active model
    DebugModel(DebugModelCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and config file
    let config = AppConfig::load_with_file(cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.session,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Simserver CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Session: {}", config.session);

    // Ensure .simserver directory exists
    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Status(_) => "status",
        Commands::Buffer(_) => "buffer",
        Commands::Train(_) => "train",
        Commands::Index(_) => "index",
        Commands::Delete(_) => "delete",
        Commands::Optimize(_) => "optimize",
        Commands::Find(_) => "find",
        Commands::Drop(_) => "drop",
        Commands::DebugModel(_) => "debug-model",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Buffer(cmd) => cmd.execute(&config).await,
        Commands::Train(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Delete(cmd) => cmd.execute(&config).await,
        Commands::Optimize(cmd) => cmd.execute(&config).await,
        Commands::Find(cmd) => cmd.execute(&config).await,
        Commands::Drop(cmd) => cmd.execute(&config).await,
        Commands::DebugModel(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
