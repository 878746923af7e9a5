//! Sitewright CLI - static site build pipeline with live reload.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "sitewright")]
#[command(about = "Static site build pipeline with live reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to site.toml config file
    #[arg(short, long, default_value = "site.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tasks in order (default: "default")
    Run {
        /// Task names
        tasks: Vec<String>,

        /// Override the static server port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List every task with its dependencies
    List,

    /// Scaffold a source tree and site.toml
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        None => {
            commands::run::run(&cli.config, Vec::new(), None).await?;
        }
        Some(Commands::Run { tasks, port }) => {
            commands::run::run(&cli.config, tasks, port).await?;
        }
        Some(Commands::List) => {
            commands::list::run(&cli.config)?;
        }
        Some(Commands::Init { yes }) => {
            commands::init::run(&cli.config, yes).await?;
        }
    }

    Ok(())
}
