//! Delve CLI: the main entry point.
//!
//! Commands:
//! - `serve`      : Start the HTTP gateway
//! - `chat`       : Run the research agent in the terminal
//! - `research`   : Browse stored research
//! - `transcribe` : Transcribe an audio file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "delve",
    about = "Delve: a streaming deep-research agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.delve/config.toml)
    #[arg(short, long, global = true, env = "DELVE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep research in memory instead of the SQLite store
        #[arg(long)]
        ephemeral: bool,
    },

    /// Chat with the research agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Keep research in memory instead of the SQLite store
        #[arg(long)]
        ephemeral: bool,
    },

    /// Browse stored research
    Research {
        #[command(subcommand)]
        action: commands::research::ResearchAction,
    },

    /// Transcribe an audio file
    Transcribe {
        /// Path to a wav, mp3 or webm file
        file: PathBuf,

        /// Language code (e.g. en, fr)
        #[arg(short, long)]
        language: Option<String>,

        /// Whisper model
        #[arg(short, long)]
        model: Option<String>,
    },
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

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, ephemeral } => commands::serve::run(config, port, ephemeral).await?,
        Commands::Chat { message, ephemeral } => {
            commands::chat::run(config, message, ephemeral).await?
        }
        Commands::Research { action } => commands::research::run(config, action).await?,
        Commands::Transcribe {
            file,
            language,
            model,
        } => commands::transcribe::run(config, file, language, model).await?,
    }

    Ok(())
}
