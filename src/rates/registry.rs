//! Rate source registry.
//!
//! Builds source implementations from the `[[sources]]` config entries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::providers::{DolarApiSource, JsonEndpointSource, PyDolarSource};
use super::RateSource;
use crate::config::{SourceConfig, SourceType};

/// Build enabled sources in priority order (lower priority value first).
///
/// All sources share one HTTP client; `request_timeout` bounds each request.
pub fn build_sources(
    configs: &[SourceConfig],
    request_timeout: Duration,
) -> Result<Vec<Arc<dyn RateSource>>> {
    let client = Client::builder()
        .connect_timeout(request_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let mut enabled: Vec<&SourceConfig> = configs.iter().filter(|c| c.enabled).collect();
    enabled.sort_by_key(|c| c.priority);

    let mut sources: Vec<Arc<dyn RateSource>> = Vec::with_capacity(enabled.len());
    for config in enabled {
        let source = match config.source_type {
            SourceType::DolarApi => {
                let mut source = DolarApiSource::new(&config.id)
                    .with_client(client.clone())
                    .with_timeout(request_timeout);
                if let Some(url) = &config.url {
                    source = source.with_base_url(url);
                }
                if let Some(kind) = &config.kind {
                    source = source.with_kind(kind);
                }
                Arc::new(source) as Arc<dyn RateSource>
            }
            SourceType::Pydolar => {
                let mut source = PyDolarSource::new(&config.id)
                    .with_client(client.clone())
                    .with_timeout(request_timeout);
                if let Some(url) = &config.url {
                    source = source.with_base_url(url);
                }
                if let Some(page) = &config.kind {
                    source = source.with_page(page);
                }
                Arc::new(source) as Arc<dyn RateSource>
            }
            SourceType::Json => {
                let url = config
                    .url
                    .as_ref()
                    .with_context(|| format!("Source {} (json) requires a url", config.id))?;
                let source = JsonEndpointSource::new(&config.id, url)
                    .with_fields(config.fields.clone().unwrap_or_default())
                    .with_client(client.clone())
                    .with_timeout(request_timeout);
                Arc::new(source) as Arc<dyn RateSource>
            }
        };
        sources.push(source);
    }

    Ok(sources)
}
