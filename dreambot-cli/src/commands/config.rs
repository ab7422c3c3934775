//! Config command - manage configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dreambot_net::describe_secs;
use dreambot_store::{Config, RuleConfig, default_config_dir};
use tracing::info;

use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Group URLs matching a pattern under one backoff state.
    AddRule {
        /// Regular expression searched for in request URLs.
        pattern: String,

        /// Backoff ceiling for this rule, in seconds.
        #[arg(long)]
        max_backoff: Option<u64>,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli, config)?,
        ConfigAction::Path => show_paths(cli)?,
        ConfigAction::Init { force } => init_config(cli, *force).await?,
        ConfigAction::AddRule {
            pattern,
            max_backoff,
        } => add_rule(cli, config, pattern, *max_backoff).await?,
        ConfigAction::Reset => reset_config(cli).await?,
    }
    Ok(ExitCode::Success)
}

fn show_config(cli: &Cli, config: &Config) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let network = &config.network;
            println!("DreamBot Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!(
                "Max backoff:   {} ({}s)",
                describe_secs(network.max_backoff_secs),
                network.max_backoff_secs
            );
            println!("Timeout:       {}s", network.timeout_secs);
            println!(
                "User agent:    {}",
                network.user_agent.as_deref().unwrap_or("(default)")
            );
            println!("Debug scopes:  {}", join_or_none(&network.debug_scopes));
            println!("Log level:     {}", config.logging.level);
            println!();
            println!("Backoff rules:");
            if network.rules.is_empty() {
                println!("  (none, every URL backs off on its own)");
            }
            for rule in &network.rules {
                let max = rule.max_backoff_secs.unwrap_or(network.max_backoff_secs);
                println!("  • {}  (max {})", rule.pattern, describe_secs(max));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(config)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let config_path = cli.config_path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:  {}", config_dir.display());
            println!("Config file: {}", config_path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = cli.config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default()
        .save_to(&path)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), "Configuration initialized");
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn add_rule(
    cli: &Cli,
    config: &Config,
    pattern: &str,
    max_backoff: Option<u64>,
) -> Result<()> {
    let path = cli.config_path();
    let mut updated = config.clone();

    if updated.network.rules.iter().any(|r| r.pattern == pattern) {
        anyhow::bail!("Rule already exists: {pattern}");
    }

    updated.network.rules.push(RuleConfig {
        pattern: pattern.to_string(),
        max_backoff_secs: max_backoff,
    });
    updated.save_to(&path).await?;

    info!(pattern, "Backoff rule added");
    println!("Added rule: {pattern}");
    Ok(())
}

async fn reset_config(cli: &Cli) -> Result<()> {
    let path = cli.config_path();

    if path.exists() {
        tokio::fs::remove_file(&path).await?;
        info!(path = %path.display(), "Configuration reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}
