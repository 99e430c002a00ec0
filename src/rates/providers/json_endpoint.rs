//! Generic JSON endpoint rate source.
//!
//! Issues a single GET, expects a JSON object and reads the rate from the
//! first recognized field. The preset providers in this module tree are thin
//! wrappers that know a specific endpoint and field name.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::rates::{extract_rate, RateSource, SourceError, DEFAULT_RATE_FIELDS};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// GET `url`, bounded by `timeout`, and extract the rate from `fields`.
pub(crate) async fn fetch_json_rate(
    client: &Client,
    url: &str,
    fields: &[String],
    timeout: Duration,
) -> Result<f64, SourceError> {
    debug!(url = %url, "requesting rate");

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(map_request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }

    let body: Value = response.json().await.map_err(|e| {
        if e.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Malformed(e.to_string())
        }
    })?;

    extract_rate(&body, fields)
}

fn map_request_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Network(err.to_string())
    }
}

/// Rate source for an arbitrary JSON endpoint.
#[derive(Debug, Clone)]
pub struct JsonEndpointSource {
    id: String,
    url: String,
    fields: Vec<String>,
    timeout: Duration,
    client: Client,
}

impl JsonEndpointSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            fields: DEFAULT_RATE_FIELDS.iter().map(|f| f.to_string()).collect(),
            timeout: DEFAULT_TIMEOUT,
            client: Client::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        if !fields.is_empty() {
            self.fields = fields;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

#[async_trait::async_trait]
impl RateSource for JsonEndpointSource {
    async fn fetch(&self) -> Result<f64, SourceError> {
        fetch_json_rate(&self.client, &self.url, &self.fields, self.timeout).await
    }

    fn name(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_known_fields() {
        let source = JsonEndpointSource::new("custom", "https://rates.example/usd");
        assert_eq!(source.name(), "custom");
        assert_eq!(source.fields(), &["price", "promedio", "rate"]);
        assert_eq!(source.url(), "https://rates.example/usd");
    }

    #[test]
    fn empty_field_override_keeps_defaults() {
        let source = JsonEndpointSource::new("custom", "https://rates.example/usd")
            .with_fields(Vec::new());
        assert_eq!(source.fields().len(), 3);

        let source = source.with_fields(vec!["valor".to_string()]);
        assert_eq!(source.fields(), &["valor"]);
    }
}
