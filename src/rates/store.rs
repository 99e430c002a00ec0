use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{RateBounds, RateRecord, USD};
use crate::clock::{Clock, SystemClock};

/// Append-only rate history with exactly one active record.
#[async_trait::async_trait]
pub trait RateStore: Send + Sync {
    async fn get_active(&self) -> Result<Option<RateRecord>>;

    /// Deactivate every active record and append `rate` as the new active
    /// one, as a single critical section. Rejects implausible rates.
    async fn insert_and_activate(&self, source: &str, rate: f64) -> Result<RateRecord>;

    /// Newest first.
    async fn get_history(&self, limit: usize) -> Result<Vec<RateRecord>>;

    /// Records with `start <= created_at <= end`, newest first.
    async fn get_range(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<RateRecord>>;

    async fn get_latest_by_source(&self, source: &str) -> Result<Option<RateRecord>>;
}

/// Apply insert-and-activate to an in-memory history.
///
/// The new record's id is one past the largest id, and its timestamp is never
/// earlier than the newest existing record's.
pub(crate) fn activate_in(
    records: &mut Vec<RateRecord>,
    source: &str,
    rate: f64,
    to_currency: &str,
    now: DateTime<Utc>,
) -> RateRecord {
    let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
    let created_at = records
        .iter()
        .map(|r| r.created_at)
        .max()
        .map_or(now, |latest| latest.max(now));

    for record in records.iter_mut() {
        record.is_active = false;
    }

    let record = RateRecord {
        id: next_id,
        source: source.to_string(),
        rate,
        from_currency: USD.to_string(),
        to_currency: to_currency.to_string(),
        is_active: true,
        created_at,
    };
    records.push(record.clone());
    record
}

fn newest_first(mut records: Vec<RateRecord>) -> Vec<RateRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    records
}

pub(crate) fn select_active(records: &[RateRecord]) -> Option<RateRecord> {
    records
        .iter()
        .filter(|r| r.is_active)
        .max_by_key(|r| (r.created_at, r.id))
        .cloned()
}

pub(crate) fn select_history(records: &[RateRecord], limit: usize) -> Vec<RateRecord> {
    let mut sorted = newest_first(records.to_vec());
    sorted.truncate(limit);
    sorted
}

pub(crate) fn select_range(
    records: &[RateRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<RateRecord> {
    newest_first(
        records
            .iter()
            .filter(|r| r.created_at >= start && r.created_at <= end)
            .cloned()
            .collect(),
    )
}

pub(crate) fn select_latest_by_source(records: &[RateRecord], source: &str) -> Option<RateRecord> {
    records
        .iter()
        .filter(|r| r.source == source)
        .max_by_key(|r| (r.created_at, r.id))
        .cloned()
}

/// In-process rate store.
pub struct MemoryRateStore {
    records: Mutex<Vec<RateRecord>>,
    bounds: RateBounds,
    to_currency: String,
    clock: Arc<dyn Clock>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            bounds: RateBounds::default(),
            to_currency: "VES".to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_bounds(mut self, bounds: RateBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_local_currency(mut self, code: impl Into<String>) -> Self {
        self.to_currency = code.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Every record, oldest first. Test helper for invariant checks.
    pub async fn all_records(&self) -> Vec<RateRecord> {
        self.records.lock().await.clone()
    }
}

impl Default for MemoryRateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateStore for MemoryRateStore {
    async fn get_active(&self) -> Result<Option<RateRecord>> {
        let records = self.records.lock().await;
        Ok(select_active(&records))
    }

    async fn insert_and_activate(&self, source: &str, rate: f64) -> Result<RateRecord> {
        let rate = self.bounds.check(rate)?;
        let mut records = self.records.lock().await;
        let now = self.clock.now();
        Ok(activate_in(&mut records, source, rate, &self.to_currency, now))
    }

    async fn get_history(&self, limit: usize) -> Result<Vec<RateRecord>> {
        let records = self.records.lock().await;
        Ok(select_history(&records, limit))
    }

    async fn get_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RateRecord>> {
        let records = self.records.lock().await;
        Ok(select_range(&records, start, end))
    }

    async fn get_latest_by_source(&self, source: &str) -> Result<Option<RateRecord>> {
        let records = self.records.lock().await;
        Ok(select_latest_by_source(&records, source))
    }
}
