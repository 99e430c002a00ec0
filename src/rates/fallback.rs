use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{FetchError, FetchedRate, RateSource, SourceError, SourceFailure, SourceOutcome};

/// Tries rate sources in priority order until one produces a valid rate.
pub struct FallbackFetcher {
    sources: HashMap<String, Arc<dyn RateSource>>,
    order: Vec<String>,
}

impl FallbackFetcher {
    /// `sources` are registered by name; their order here becomes the default
    /// priority order.
    pub fn new(sources: Vec<Arc<dyn RateSource>>) -> Self {
        let mut map = HashMap::with_capacity(sources.len());
        let mut order = Vec::with_capacity(sources.len());
        for source in sources {
            let name = source.name().to_string();
            if map.insert(name.clone(), source).is_none() {
                order.push(name);
            }
        }
        Self {
            sources: map,
            order,
        }
    }

    /// Source ids in default priority order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Default order with `preferred` moved to the front.
    pub fn order_preferring(&self, preferred: &str) -> Vec<String> {
        let mut order = Vec::with_capacity(self.order.len() + 1);
        order.push(preferred.to_string());
        order.extend(self.order.iter().filter(|id| *id != preferred).cloned());
        order
    }

    async fn fetch_one(&self, id: &str) -> Result<f64, SourceError> {
        match self.sources.get(id) {
            Some(source) => source.fetch().await,
            None => Err(SourceError::UnknownSource(id.to_string())),
        }
    }

    /// Try each source in `order`, returning the first success. Sources after
    /// the first success are not contacted.
    pub async fn fetch_with_fallback<S: AsRef<str>>(
        &self,
        order: &[S],
    ) -> Result<FetchedRate, FetchError> {
        if order.is_empty() {
            return Err(FetchError::NoSources);
        }

        let mut failures = Vec::new();
        for id in order {
            let id = id.as_ref();
            debug!(source = %id, "fetching rate");
            match self.fetch_one(id).await {
                Ok(rate) => {
                    info!(source = %id, rate, skipped = failures.len(), "rate fetched");
                    return Ok(FetchedRate {
                        source: id.to_string(),
                        rate,
                    });
                }
                Err(error) => {
                    warn!(source = %id, error = %error, "rate source failed, trying next");
                    failures.push(SourceFailure {
                        source: id.to_string(),
                        error,
                    });
                }
            }
        }

        Err(FetchError::Exhausted(failures))
    }

    /// Fetch from every source concurrently for comparison. Outcomes come back
    /// in input order; one failure never hides another source's result.
    pub async fn fetch_all<S: AsRef<str>>(&self, ids: &[S]) -> Vec<SourceOutcome> {
        let fetches = ids.iter().map(|id| async move {
            let id = id.as_ref();
            match self.fetch_one(id).await {
                Ok(rate) => SourceOutcome {
                    source: id.to_string(),
                    rate: Some(rate),
                    error: None,
                },
                Err(error) => SourceOutcome {
                    source: id.to_string(),
                    rate: None,
                    error: Some(error.to_string()),
                },
            }
        });
        join_all(fetches).await
    }
}
