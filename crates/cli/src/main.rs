//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `chat`    : Interactive chat or single-message mode on a thread
//! - `threads` : List saved threads
//! - `history` : Print a thread's messages
//! - `tools`   : List the tools the model can call
//! - `serve`   : Start the HTTP API server

use anyhow::Context;
use clap::{Parser, Subcommand};
use parley_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: a tool-using conversational agent with resumable threads",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.parley/config.toml)
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Resume (or create) this thread; a new id is generated otherwise
        #[arg(short, long)]
        thread: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List saved threads
    Threads,

    /// Print the messages of a thread
    History {
        /// Thread id
        thread: String,
    },

    /// List available tools
    Tools,

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = AppConfig::load_with(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Chat { thread, message } => commands::chat::run(&config, thread, message).await?,
        Commands::Threads => commands::threads::run(&config).await?,
        Commands::History { thread } => commands::history::run(&config, thread).await?,
        Commands::Tools => commands::tools::run(&config)?,
        Commands::Serve { port } => commands::serve::run(config, port).await?,
    }

    Ok(())
}
