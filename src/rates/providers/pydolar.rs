//! PyDolarVe rate source.
//!
//! `GET {base}/api/v2/dollar?page={page}&monitor=usd` returns a single
//! monitor object whose rate is under `price`.

use std::time::Duration;

use reqwest::Client;

use super::json_endpoint::{fetch_json_rate, DEFAULT_TIMEOUT};
use crate::rates::{RateSource, SourceError};

const PYDOLAR_BASE_URL: &str = "https://pydolarve.org";

#[derive(Debug, Clone)]
pub struct PyDolarSource {
    id: String,
    base_url: String,
    page: String,
    fields: Vec<String>,
    timeout: Duration,
    client: Client,
}

impl PyDolarSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: PYDOLAR_BASE_URL.to_string(),
            page: "bcv".to_string(),
            fields: vec!["price".to_string()],
            timeout: DEFAULT_TIMEOUT,
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Monitor page, e.g. `bcv` or `enparalelovzla`.
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
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

    pub fn url(&self) -> String {
        format!("{}/api/v2/dollar?page={}&monitor=usd", self.base_url, self.page)
    }
}

#[async_trait::async_trait]
impl RateSource for PyDolarSource {
    async fn fetch(&self) -> Result<f64, SourceError> {
        fetch_json_rate(&self.client, &self.url(), &self.fields, self.timeout).await
    }

    fn name(&self) -> &str {
        &self.id
    }
}
