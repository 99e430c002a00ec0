#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use ratebook::rates::{RateSource, SourceError};
use ratebook::receivables::{MemoryReceivableLedger, Receivable, ReceivableLedger};

/// Scripted rate source that counts how often it was asked.
#[derive(Debug, Clone)]
pub struct MockRateSource {
    pub name: String,
    pub result: Result<f64, SourceError>,
    pub delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockRateSource {
    pub fn ok(name: &str, rate: f64) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(rate),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &str, error: SourceError) -> Self {
        Self {
            result: Err(error),
            ..Self::ok(name, 0.0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter; stays valid after the source is moved into a fetcher.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn boxed(self) -> Arc<dyn RateSource> {
        Arc::new(self)
    }
}

#[async_trait]
impl RateSource for MockRateSource {
    async fn fetch(&self) -> Result<f64, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Ledger wrapper that refuses to update the listed receivable ids.
pub struct PartiallyFailingLedger {
    pub inner: MemoryReceivableLedger,
    reject: Mutex<Vec<String>>,
}

impl PartiallyFailingLedger {
    pub fn new(reject: &[&str]) -> Self {
        Self {
            inner: MemoryReceivableLedger::new(),
            reject: Mutex::new(reject.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn accept_all(&self) {
        self.reject.lock().expect("reject list").clear();
    }

    fn rejects(&self, id: &str) -> bool {
        self.reject.lock().expect("reject list").iter().any(|r| r == id)
    }
}

#[async_trait]
impl ReceivableLedger for PartiallyFailingLedger {
    async fn find_open_usd_receivables(&self) -> Result<Vec<Receivable>> {
        self.inner.find_open_usd_receivables().await
    }

    async fn update_receivable_amount(&self, id: &str, new_amount: Decimal) -> Result<()> {
        if self.rejects(id) {
            bail!("write rejected for {id}");
        }
        self.inner.update_receivable_amount(id, new_amount).await
    }
}

/// Ledger whose first query stalls, so the pass it belongs to finishes late.
pub struct SlowFirstQueryLedger {
    pub inner: MemoryReceivableLedger,
    delay: Duration,
    queried: AtomicBool,
}

impl SlowFirstQueryLedger {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryReceivableLedger::new(),
            delay,
            queried: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ReceivableLedger for SlowFirstQueryLedger {
    async fn find_open_usd_receivables(&self) -> Result<Vec<Receivable>> {
        let found = self.inner.find_open_usd_receivables().await?;
        if !self.queried.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(found)
    }

    async fn update_receivable_amount(&self, id: &str, new_amount: Decimal) -> Result<()> {
        self.inner.update_receivable_amount(id, new_amount).await
    }
}

/// Ledger whose query always fails.
pub struct UnavailableLedger;

#[async_trait]
impl ReceivableLedger for UnavailableLedger {
    async fn find_open_usd_receivables(&self) -> Result<Vec<Receivable>> {
        bail!("ledger unavailable")
    }

    async fn update_receivable_amount(&self, _id: &str, _new_amount: Decimal) -> Result<()> {
        bail!("ledger unavailable")
    }
}

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("valid decimal")
}
