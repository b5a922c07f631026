//! one-oauth CLI

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{CheckCommand, ServeCommand};
use one_oauth::observability::LogFormat;

#[derive(Parser)]
#[command(name = "one-oauth")]
#[command(version)]
#[command(about = "Multi-provider OAuth2 login proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy
    Serve {
        /// Configuration file (.toml or .json)
        #[arg(short, long, default_value = "one-oauth.toml")]
        config: PathBuf,
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
        /// Log format: `pretty` or `json`
        #[arg(long)]
        log_format: Option<LogFormat>,
    },
    /// Validate a configuration and list the routes it would mount
    Check {
        /// Configuration file (.toml or .json)
        #[arg(short, long, default_value = "one-oauth.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            log_format,
        } => {
            ServeCommand::new(config, port, log_format.unwrap_or_default())
                .execute()
                .await?;
        }
        Commands::Check { config } => {
            CheckCommand::new(config).execute()?;
        }
    }

    Ok(())
}
