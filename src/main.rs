use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ratebook::app;
use ratebook::config::{default_config_path, ResolvedConfig};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    ratebook::duration::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "ratebook")]
#[command(about = "USD exchange rate tracking and receivable reconciliation")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,

    /// Show the active rate
    Current,

    /// Fetch a fresh rate (with fallback) and activate it
    Refresh {
        /// Source id to try first
        #[arg(long)]
        source: Option<String>,
    },

    /// Activate a manually entered rate
    Set {
        /// Rate in local currency per USD ("36.5" or "36,5")
        rate: String,
    },

    /// List recent rate records, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// List rate records created within a time range
    Range {
        /// Start (RFC 3339)
        #[arg(long)]
        from: String,
        /// End (RFC 3339)
        #[arg(long)]
        to: String,
    },

    /// Show the most recent record from one source
    Latest {
        #[arg(long)]
        source: String,
    },

    /// Query every source without activating anything
    Compare,

    /// Check whether the active rate is stale
    Stale {
        /// Override the configured staleness threshold (e.g. "30m")
        #[arg(long, value_parser = parse_duration_arg)]
        threshold: Option<Duration>,
    },

    /// Recompute USD receivables from the active rate
    Reconcile,

    /// List receivables
    Receivables,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    if let Command::Config = cli.command {
        return print_json(&app::config_output(&cli.config, &config));
    }
    if let Command::Receivables = cli.command {
        return print_json(&app::list_receivables(&config).await?);
    }

    let manager = app::build_manager(&config)?;
    manager.initialize().await?;

    match cli.command {
        Command::Current => print_json(&app::current_rate(&manager, &config).await?),
        Command::Refresh { source } => {
            print_json(&app::refresh_rate(&manager, &config, source.as_deref()).await?)
        }
        Command::Set { rate } => print_json(&app::set_rate(&manager, &config, &rate).await?),
        Command::History { limit } => {
            print_json(&app::rate_history(&manager, &config, limit).await?)
        }
        Command::Range { from, to } => {
            print_json(&app::rate_range(&manager, &config, &from, &to).await?)
        }
        Command::Latest { source } => {
            print_json(&app::latest_rate(&manager, &config, &source).await?)
        }
        Command::Compare => print_json(&app::compare_sources(&manager, &config).await),
        Command::Stale { threshold } => {
            print_json(&app::check_staleness(&manager, &config, threshold).await?)
        }
        Command::Reconcile => print_json(&app::reconcile(&manager).await?),
        Command::Config | Command::Receivables => Ok(()),
    }
}
