use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag for rates entered by hand.
pub const MANUAL_SOURCE: &str = "MANUAL";

pub const USD: &str = "USD";

/// An immutable fact about the USD -> local rate at a point in time.
///
/// Only the store creates these, and only the store's insert-and-activate
/// path ever clears `is_active` on an older record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub id: u64,
    pub source: String,
    /// Local-currency units per 1 USD.
    pub rate: f64,
    pub from_currency: String,
    pub to_currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl RateRecord {
    pub fn is_manual(&self) -> bool {
        self.source == MANUAL_SOURCE
    }
}

/// The rate the rest of the process reads synchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentRate {
    pub rate: f64,
    pub source: String,
    pub updated_at: DateTime<Utc>,
    /// `None` for display-only updates that were never persisted.
    pub record_id: Option<u64>,
}

impl From<&RateRecord> for CurrentRate {
    fn from(record: &RateRecord) -> Self {
        Self {
            rate: record.rate,
            source: record.source.clone(),
            updated_at: record.created_at,
            record_id: Some(record.id),
        }
    }
}

/// First successful result of a fallback fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedRate {
    pub source: String,
    pub rate: f64,
}

/// Per-source result of a fetch-all comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        self.rate.is_some()
    }
}
