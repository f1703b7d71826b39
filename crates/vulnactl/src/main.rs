//! Vulna control - conversational CLI for CVE queries.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vulna_common::config::Config;
use vulnactl::{commands, repl};

#[derive(Parser)]
#[command(name = "vulnactl")]
#[command(about = "Vulna - natural-language CVE queries", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file path (defaults to $VULNA_CONFIG or ~/.config/vulna/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the system prompt variant (default, concise, detailed, analytics)
    #[arg(long, global = true)]
    prompt: Option<String>,

    /// Override the tool-round cap per query
    #[arg(long, global = true)]
    iterations: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question and exit
    Ask {
        /// The question to answer
        query: String,
    },

    /// Interactive conversation mode
    Repl,

    /// Run the built-in demo queries
    Demo,

    /// List the tools served by the connected backends
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Quiet by default; RUST_LOG opts into diagnostics.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(prompt) = cli.prompt {
        config.agent.system_prompt = prompt;
    }
    if let Some(iterations) = cli.iterations {
        config.agent.max_iterations = iterations;
    }

    match cli.command {
        Commands::Ask { query } => commands::ask(&config, &query).await,
        Commands::Repl => repl::start_repl(&config).await,
        Commands::Demo => commands::demo(&config).await,
        Commands::Tools => commands::tools(&config).await,
    }
}
