use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use super::types::{ActivationOutput, RateOutput, SourceComparisonOutput, StalenessOutput};
use crate::config::ResolvedConfig;
use crate::rates::{build_sources, FallbackFetcher, JsonlRateStore, RateManager, RateRecord};
use crate::receivables::{JsonFileReceivableLedger, RecalcReport, RecalculationService};

/// Wire the file-backed store, ledger and configured sources into a manager.
pub fn build_manager(config: &ResolvedConfig) -> Result<RateManager> {
    let sources = build_sources(&config.sources, config.rates.request_timeout)?;
    let bounds = config.rates.bounds();
    let store = JsonlRateStore::new(config.rates_dir())
        .with_bounds(bounds)
        .with_local_currency(&config.local_currency);
    let ledger = JsonFileReceivableLedger::new(config.receivables_file());
    let recalculator =
        RecalculationService::new(Arc::new(ledger)).with_decimals(config.rates.display_decimals);

    Ok(RateManager::new(Arc::new(store), FallbackFetcher::new(sources))
        .with_bounds(bounds)
        .with_recalculator(recalculator))
}

fn output(record: &RateRecord, config: &ResolvedConfig) -> RateOutput {
    RateOutput::from_record(record, config.rates.display_decimals)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid RFC 3339 timestamp: {value}"))?;
    Ok(parsed.with_timezone(&Utc))
}

pub async fn current_rate(
    manager: &RateManager,
    config: &ResolvedConfig,
) -> Result<Option<RateOutput>> {
    let active = manager.stored_rate().await?;
    Ok(active.as_ref().map(|r| output(r, config)))
}

pub async fn refresh_rate(
    manager: &RateManager,
    config: &ResolvedConfig,
    source: Option<&str>,
) -> Result<ActivationOutput> {
    let record = manager.refresh_rate(source).await?;
    Ok(ActivationOutput {
        rate: output(&record, config),
        recalculation: manager.snapshot().last_recalc,
    })
}

pub async fn set_rate(
    manager: &RateManager,
    config: &ResolvedConfig,
    input: &str,
) -> Result<ActivationOutput> {
    let record = manager.set_manual_rate_input(input).await?;
    Ok(ActivationOutput {
        rate: output(&record, config),
        recalculation: manager.snapshot().last_recalc,
    })
}

pub async fn rate_history(
    manager: &RateManager,
    config: &ResolvedConfig,
    limit: usize,
) -> Result<Vec<RateOutput>> {
    let records = manager.history(limit).await?;
    Ok(records.iter().map(|r| output(r, config)).collect())
}

pub async fn rate_range(
    manager: &RateManager,
    config: &ResolvedConfig,
    from: &str,
    to: &str,
) -> Result<Vec<RateOutput>> {
    let start = parse_timestamp(from)?;
    let end = parse_timestamp(to)?;
    if start > end {
        bail!("Range start {from} is after end {to}");
    }
    let records = manager.range(start, end).await?;
    Ok(records.iter().map(|r| output(r, config)).collect())
}

pub async fn latest_rate(
    manager: &RateManager,
    config: &ResolvedConfig,
    source: &str,
) -> Result<Option<RateOutput>> {
    let latest = manager.latest_by_source(source).await?;
    Ok(latest.as_ref().map(|r| output(r, config)))
}

pub async fn compare_sources(
    manager: &RateManager,
    config: &ResolvedConfig,
) -> Vec<SourceComparisonOutput> {
    manager
        .compare_sources()
        .await
        .into_iter()
        .map(|o| SourceComparisonOutput::from_outcome(o, config.rates.display_decimals))
        .collect()
}

pub async fn check_staleness(
    manager: &RateManager,
    config: &ResolvedConfig,
    threshold: Option<Duration>,
) -> Result<StalenessOutput> {
    let threshold = threshold.unwrap_or(config.rates.staleness);
    let check = manager.check_staleness(threshold).await?;
    let active = manager.stored_rate().await?;
    Ok(StalenessOutput::new(
        &check,
        active.as_ref().map(|r| output(r, config)),
    ))
}

pub async fn reconcile(manager: &RateManager) -> Result<RecalcReport> {
    Ok(manager.reconcile().await?)
}
