// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! DreamBot CLI - exercise the bot's outbound HTTP layer from a terminal.
//!
//! # Examples
//!
//! ```bash
//! # One-shot fetch, degrading to "no response" on failure
//! dreambot fetch https://prices.example/latest --as json
//!
//! # Strict fetch with a header, surfacing the classified error
//! dreambot fetch https://wiki.example/page -H 'Authorization: Bearer x' --forward-exceptions
//!
//! # Poll two endpoints every 30 seconds and watch their backoff
//! dreambot watch https://a.example/feed https://b.example/feed --interval 30
//!
//! # Trace every request of the network layer
//! dreambot --debug-scope network fetch https://api.example/x
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dreambot_store::{Config, LoggingConfig, default_config_path};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, fetch, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// DreamBot CLI - backoff-aware HTTP fetching.
#[derive(Parser)]
#[command(name = "dreambot")]
#[command(about = "Fetch and poll external APIs through DreamBot's network layer")]
#[command(version)]
#[command(author = "DreamBot Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable a debug scope (repeatable), e.g. `network`.
    #[arg(long = "debug-scope", global = true)]
    pub debug_scopes: Vec<String>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a URL once.
    #[command(visible_alias = "f")]
    Fetch(fetch::FetchArgs),

    /// Poll URLs periodically and show backoff state.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// The request produced no response.
    NoResponse = 2,
}

impl Cli {
    /// Configuration file in effect.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, logging: &LoggingConfig) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("dreambot=debug,info")
    } else {
        EnvFilter::try_new(format!("dreambot={}", logging.level))
            .unwrap_or_else(|_| EnvFilter::new("dreambot=warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config_path()).await {
        Ok(config) => config,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    };

    setup_logging(cli.verbose, cli.quiet, &config.logging);

    let result = match &cli.command {
        Commands::Fetch(args) => fetch::run(args, &cli, &config).await,
        Commands::Watch(args) => watch::run(args, &cli, &config).await,
        Commands::Config(args) => config::run(args, &cli, &config).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
