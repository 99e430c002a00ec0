use serde::Serialize;

use crate::format::{format_amount, format_rate};
use crate::rates::{RateRecord, SourceOutcome};
use crate::receivables::{BaseCurrency, Receivable, ReceivableStatus, RecalcReport};
use crate::staleness::StalenessCheck;

/// JSON output for a stored rate record
#[derive(Debug, Serialize)]
pub struct RateOutput {
    pub id: u64,
    pub source: String,
    pub rate: f64,
    pub display: String,
    pub from_currency: String,
    pub to_currency: String,
    pub is_active: bool,
    pub created_at: String,
}

impl RateOutput {
    pub fn from_record(record: &RateRecord, decimals: u32) -> Self {
        Self {
            id: record.id,
            source: record.source.clone(),
            rate: record.rate,
            display: format_rate(record.rate, decimals),
            from_currency: record.from_currency.clone(),
            to_currency: record.to_currency.clone(),
            is_active: record.is_active,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// JSON output for a refresh or manual override
#[derive(Debug, Serialize)]
pub struct ActivationOutput {
    pub rate: RateOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recalculation: Option<RecalcReport>,
}

/// JSON output for one source in a comparison report
#[derive(Debug, Serialize)]
pub struct SourceComparisonOutput {
    pub source: String,
    pub rate: Option<f64>,
    pub display: Option<String>,
    pub error: Option<String>,
}

impl SourceComparisonOutput {
    pub fn from_outcome(outcome: SourceOutcome, decimals: u32) -> Self {
        Self {
            display: outcome.rate.map(|r| format_rate(r, decimals)),
            source: outcome.source,
            rate: outcome.rate,
            error: outcome.error,
        }
    }
}

/// JSON output for a staleness check
#[derive(Debug, Serialize)]
pub struct StalenessOutput {
    pub is_stale: bool,
    pub age: Option<String>,
    pub threshold: String,
    pub active: Option<RateOutput>,
}

impl StalenessOutput {
    pub fn new(check: &StalenessCheck, active: Option<RateOutput>) -> Self {
        Self {
            is_stale: check.is_stale,
            age: check.age.map(crate::duration::format_duration),
            threshold: crate::duration::format_duration(check.threshold),
            active,
        }
    }
}

/// JSON output for receivables
#[derive(Debug, Serialize)]
pub struct ReceivableOutput {
    pub id: String,
    pub customer: String,
    pub amount: String,
    pub base_currency: BaseCurrency,
    pub base_amount_usd: Option<String>,
    pub exchange_rate_at_creation: Option<f64>,
    pub status: ReceivableStatus,
}

impl ReceivableOutput {
    pub fn from_receivable(receivable: &Receivable, decimals: u32) -> Self {
        Self {
            id: receivable.id.clone(),
            customer: receivable.customer.clone(),
            amount: format_amount(receivable.amount, decimals),
            base_currency: receivable.base_currency,
            base_amount_usd: receivable.base_amount_usd.map(|d| d.normalize().to_string()),
            exchange_rate_at_creation: receivable.exchange_rate_at_creation,
            status: receivable.status,
        }
    }
}
