use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use ratebook::app;
use ratebook::config::{default_config_path, ResolvedConfig};
use ratebook::rates::{AutoRefresh, RatePhase};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    ratebook::duration::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "ratebook-daemon")]
#[command(about = "Long-running exchange rate refresh daemon")]
struct Cli {
    /// Path to ratebook config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// How often to check the active rate (defaults to `rates.refresh_interval`).
    #[arg(long, value_parser = parse_duration_arg)]
    interval: Option<Duration>,

    /// Add random jitter in the range [-jitter, +jitter] to each interval.
    #[arg(long, default_value = "0s", value_parser = parse_duration_arg)]
    jitter: Duration,

    /// Override the staleness threshold (defaults to `rates.staleness`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    staleness: Option<Duration>,

    /// Skip the immediate startup refresh check.
    #[arg(long)]
    no_refresh_on_start: bool,
}

fn compute_next_delay(interval: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return interval;
    }

    let base_ms = interval.as_millis().min(u128::from(u64::MAX)) as i128;
    let jitter_ms = jitter.as_millis().min(u128::from(u64::MAX)) as i128;
    let offset = rand::thread_rng().gen_range(-jitter_ms..=jitter_ms);

    let delay_ms = (base_ms + offset).clamp(1_000, i128::from(u64::MAX)) as u64;
    Duration::from_millis(delay_ms)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load ratebook config: {}", cli.config.display()))?;
    if let Some(staleness) = cli.staleness {
        config.rates.staleness = staleness;
    }
    let interval = cli.interval.unwrap_or(config.rates.refresh_interval);

    let manager = Arc::new(app::build_manager(&config)?);
    match manager.initialize().await? {
        Some(current) => info!(rate = current.rate, source = %current.source, "loaded active rate"),
        None => info!("no active rate yet"),
    }

    let _watcher = manager.on_change(|snapshot| match snapshot.phase {
        RatePhase::Failed => warn!(
            error = snapshot.last_error.as_deref().unwrap_or("unknown"),
            "rate update failed"
        ),
        RatePhase::Activated => {
            if let Some(current) = &snapshot.current {
                info!(rate = current.rate, source = %current.source, "rate updated");
            }
        }
        _ => {}
    });

    let jitter = cli.jitter;
    let refresher = AutoRefresh::new(manager.clone(), interval, config.rates.staleness)
        .with_delay_fn(move |interval| compute_next_delay(interval, jitter));

    if !cli.no_refresh_on_start {
        refresher.run_cycle("startup").await;
    }

    let handle = refresher.spawn();
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutting down");
    handle.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_next_delay_without_jitter_is_constant() {
        let interval = Duration::from_secs(300);
        assert_eq!(compute_next_delay(interval, Duration::ZERO), interval);
    }

    #[test]
    fn compute_next_delay_with_jitter_stays_in_range() {
        let interval = Duration::from_secs(600);
        let jitter = Duration::from_secs(120);

        for _ in 0..100 {
            let delay = compute_next_delay(interval, jitter);
            assert!(delay >= Duration::from_secs(480));
            assert!(delay <= Duration::from_secs(720));
        }
    }
}
