//! summonbot CLI, the main entry point.
//!
//! Commands:
//! - `run`     Listen for summons and reply until Ctrl-C
//! - `ask`     Answer one comment on a made-up thread and print the reply
//! - `tool`    Run a single web tool and print its JSON result
//! - `config`  Print the default configuration
//! - `doctor`  Report missing settings

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::tool::ToolCommand;

#[derive(Parser)]
#[command(
    name = "summonbot",
    about = "summonbot: answers Reddit summons with a tool-using LLM",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to ~/.summonbot/config.toml)
    #[arg(short, long, global = true, env = "SUMMONBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for summons and reply
    Run,

    /// Answer a single comment on a synthetic thread
    Ask {
        /// Comment body, e.g. "u/grok what is new in Rust 1.88?"
        #[arg(short, long)]
        text: String,

        /// Submission title
        #[arg(long, default_value = "Ad-hoc question")]
        title: String,

        /// Subreddit name
        #[arg(long, default_value = "test")]
        subreddit: String,
    },

    /// Run one web tool
    Tool {
        #[command(subcommand)]
        tool: ToolCommand,
    },

    /// Print the default configuration
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },

    /// Report missing settings
    Doctor,
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run => {
            let config = commands::load_config(config_path)?;
            let code = commands::run::run(config).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Ask {
            text,
            title,
            subreddit,
        } => {
            let config = commands::load_config(config_path)?;
            commands::ask::run(config, &text, &title, &subreddit).await?;
        }
        Commands::Tool { tool } => {
            let config = commands::load_config(config_path)?;
            commands::tool::run(config, tool).await?;
        }
        Commands::Config { path } => commands::config_cmd::run(path, config_path)?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
