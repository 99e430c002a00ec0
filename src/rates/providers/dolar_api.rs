//! DolarApi rate source.
//!
//! `GET {base}/v1/dolares/{kind}` returns an object such as
//! `{"fuente": "oficial", "promedio": 36.52, "fechaActualizacion": "..."}`.
//! The rate lives under `promedio`.

use std::time::Duration;

use reqwest::Client;

use super::json_endpoint::{fetch_json_rate, DEFAULT_TIMEOUT};
use crate::rates::{RateSource, SourceError};

const DOLAR_API_BASE_URL: &str = "https://ve.dolarapi.com";

#[derive(Debug, Clone)]
pub struct DolarApiSource {
    id: String,
    base_url: String,
    kind: String,
    fields: Vec<String>,
    timeout: Duration,
    client: Client,
}

impl DolarApiSource {
    /// Official (central bank) rate.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: DOLAR_API_BASE_URL.to_string(),
            kind: "oficial".to_string(),
            fields: vec!["promedio".to_string()],
            timeout: DEFAULT_TIMEOUT,
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Endpoint kind, e.g. `oficial` or `paralelo`.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
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
        format!("{}/v1/dolares/{}", self.base_url, self.kind)
    }
}

#[async_trait::async_trait]
impl RateSource for DolarApiSource {
    async fn fetch(&self) -> Result<f64, SourceError> {
        fetch_json_rate(&self.client, &self.url(), &self.fields, self.timeout).await
    }

    fn name(&self) -> &str {
        &self.id
    }
}
