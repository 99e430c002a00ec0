use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaseCurrency {
    Usd,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    Open,
    Paid,
}

/// A customer debt as the accounts module stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receivable {
    pub id: String,
    #[serde(default)]
    pub customer: String,
    /// Amount owed in local currency (display/settlement value).
    pub amount: Decimal,
    pub base_currency: BaseCurrency,
    /// USD principal. Set once at booking; recalculation never writes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_amount_usd: Option<Decimal>,
    /// Rate in effect when the debt was booked. Audit only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate_at_creation: Option<f64>,
    pub status: ReceivableStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Receivable {
    /// A USD-denominated debt booked at `rate`.
    pub fn usd(
        id: impl Into<String>,
        base_amount_usd: Decimal,
        amount: Decimal,
        rate: f64,
    ) -> Self {
        Self {
            id: id.into(),
            customer: String::new(),
            amount,
            base_currency: BaseCurrency::Usd,
            base_amount_usd: Some(base_amount_usd),
            exchange_rate_at_creation: Some(rate),
            status: ReceivableStatus::Open,
            created_at: None,
        }
    }

    /// A debt denominated natively in local currency.
    pub fn local(id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: id.into(),
            customer: String::new(),
            amount,
            base_currency: BaseCurrency::Local,
            base_amount_usd: None,
            exchange_rate_at_creation: None,
            status: ReceivableStatus::Open,
            created_at: None,
        }
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = customer.into();
        self
    }

    pub fn with_status(mut self, status: ReceivableStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether rate changes propagate to this record.
    pub fn tracks_rate(&self) -> bool {
        self.status == ReceivableStatus::Open && self.base_currency == BaseCurrency::Usd
    }
}
