//! Orchestrates fetching, activation and propagation of the exchange rate.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    parse_manual_rate, CurrentRate, FallbackFetcher, RateBounds, RateError, RateRecord, RateStore,
    SourceOutcome, MANUAL_SOURCE,
};
use crate::clock::{Clock, SystemClock};
use crate::receivables::{RecalcReport, RecalculationService};
use crate::staleness::{check_rate_staleness, log_rate_staleness, StalenessCheck};

/// Source tag for display-only updates that never reach the store.
const LOCAL_SOURCE: &str = "LOCAL";

const TRANSITION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePhase {
    #[default]
    Idle,
    Fetching,
    Activated,
    Failed,
}

/// What subscribers see after every transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateSnapshot {
    pub current: Option<CurrentRate>,
    pub phase: RatePhase,
    pub loading: bool,
    pub last_error: Option<String>,
    pub last_recalc: Option<RecalcReport>,
    /// Set when the last recalculation pass did not reach every receivable.
    pub needs_reconcile: bool,
}

/// Owns the authoritative in-process copy of the current rate.
///
/// Only this type writes the cached rate, and only after the store accepted
/// the new record (or for an explicit display-only update).
///
/// Activations are serialized end to end: store write, cache update and
/// receivable recalculation for one rate finish before the next rate is
/// written.
pub struct RateManager {
    store: Arc<dyn RateStore>,
    fetcher: FallbackFetcher,
    recalculator: Option<RecalculationService>,
    bounds: RateBounds,
    clock: Arc<dyn Clock>,
    state: watch::Sender<RateSnapshot>,
    transitions: broadcast::Sender<RateSnapshot>,
    in_flight: Mutex<()>,
    activation: Mutex<()>,
}

impl RateManager {
    pub fn new(store: Arc<dyn RateStore>, fetcher: FallbackFetcher) -> Self {
        let (state, _) = watch::channel(RateSnapshot::default());
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            store,
            fetcher,
            recalculator: None,
            bounds: RateBounds::default(),
            clock: Arc::new(SystemClock),
            state,
            transitions,
            in_flight: Mutex::new(()),
            activation: Mutex::new(()),
        }
    }

    pub fn with_recalculator(mut self, recalculator: RecalculationService) -> Self {
        self.recalculator = Some(recalculator);
        self
    }

    pub fn with_bounds(mut self, bounds: RateBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Load the store's active record into the cache.
    pub async fn initialize(&self) -> Result<Option<CurrentRate>, RateError> {
        let active = self.store.get_active().await?;
        let current = active.as_ref().map(CurrentRate::from);
        self.publish(|s| s.current = current.clone());
        debug!(has_rate = current.is_some(), "rate manager initialized");
        Ok(current)
    }

    /// Synchronous read of the cached rate.
    pub fn current_rate(&self) -> Option<CurrentRate> {
        self.state.borrow().current.clone()
    }

    pub fn snapshot(&self) -> RateSnapshot {
        self.state.borrow().clone()
    }

    /// Latest-value view. Rapid transitions may be coalesced; use
    /// [`RateManager::on_change`] to see each one.
    pub fn subscribe(&self) -> watch::Receiver<RateSnapshot> {
        self.state.subscribe()
    }

    /// Invoke `callback` with the snapshot after every transition, in order,
    /// until the manager is dropped.
    pub fn on_change<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(RateSnapshot) + Send + 'static,
    {
        let mut rx = self.transitions.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => callback(snapshot),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "rate listener fell behind, transitions dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply `update` to the snapshot and deliver the result to listeners.
    fn publish<F: FnOnce(&mut RateSnapshot)>(&self, update: F) {
        self.state.send_modify(update);
        let _ = self.transitions.send(self.state.borrow().clone());
    }

    /// Fetch with fallback and activate the result. `preferred` is tried
    /// first, the configured order follows. Waits for any fetch in flight.
    pub async fn refresh_rate(&self, preferred: Option<&str>) -> Result<RateRecord, RateError> {
        let _guard = self.in_flight.lock().await;
        let order = match preferred {
            Some(id) => self.fetcher.order_preferring(id),
            None => self.fetcher.order().to_vec(),
        };
        self.fetch_and_activate(&order).await
    }

    /// Refresh only when the active rate is older than `threshold`. Returns
    /// `None` when the rate is fresh or another fetch is already running.
    pub async fn refresh_if_stale(
        &self,
        threshold: Duration,
    ) -> Result<Option<RateRecord>, RateError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("rate fetch already in flight, skipping");
            return Ok(None);
        };

        if !self.is_stale(threshold).await? {
            return Ok(None);
        }

        let order = self.fetcher.order().to_vec();
        self.fetch_and_activate(&order).await.map(Some)
    }

    async fn fetch_and_activate(&self, order: &[String]) -> Result<RateRecord, RateError> {
        self.publish(|s| {
            s.phase = RatePhase::Fetching;
            s.loading = true;
        });

        match self.fetcher.fetch_with_fallback(order).await {
            Ok(fetched) => self.activate(&fetched.source, fetched.rate).await,
            Err(err) => {
                let err = RateError::from(err);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Activate a hand-entered rate through the regular activation path. Waits
    /// for any activation already in progress.
    pub async fn set_manual_rate(&self, value: f64) -> Result<RateRecord, RateError> {
        let value = self.bounds.check(value)?;
        info!(rate = value, "manual rate override");
        self.activate(MANUAL_SOURCE, value).await
    }

    /// Parse then activate a hand-entered rate.
    pub async fn set_manual_rate_input(&self, input: &str) -> Result<RateRecord, RateError> {
        let value = parse_manual_rate(input)?;
        self.set_manual_rate(value).await
    }

    /// Update the cached rate without touching the store.
    pub fn set_local_rate(&self, value: f64) -> Result<CurrentRate, RateError> {
        let value = self.bounds.check(value)?;
        let current = CurrentRate {
            rate: value,
            source: LOCAL_SOURCE.to_string(),
            updated_at: self.clock.now(),
            record_id: None,
        };
        self.publish(|s| s.current = Some(current.clone()));
        Ok(current)
    }

    async fn activate(&self, source: &str, rate: f64) -> Result<RateRecord, RateError> {
        if let Err(err) = self.bounds.check(rate) {
            self.fail(&err);
            return Err(err);
        }

        let _activation = self.activation.lock().await;
        let record = match self.store.insert_and_activate(source, rate).await {
            Ok(record) => record,
            Err(err) => {
                let err = match err.downcast::<RateError>() {
                    Ok(rate_err) => rate_err,
                    Err(other) => RateError::Store(other),
                };
                self.fail(&err);
                return Err(err);
            }
        };

        info!(id = record.id, source = %record.source, rate = record.rate, "rate activated");
        let current = CurrentRate::from(&record);
        self.publish(|s| {
            s.current = Some(current);
            s.phase = RatePhase::Activated;
            s.loading = false;
            s.last_error = None;
        });

        // The rate is live from here on; recalculation failures never undo it.
        self.recalculate(record.rate).await;
        Ok(record)
    }

    async fn recalculate(&self, rate: f64) {
        let Some(recalculator) = self.recalculator.as_ref() else {
            return;
        };
        match recalculator.recalculate_on_rate_change(rate).await {
            Ok(report) => self.publish(|s| {
                s.last_recalc = Some(report);
                s.needs_reconcile = report.has_failures();
            }),
            Err(err) => {
                warn!(error = %err, rate, "receivable recalculation failed");
                self.publish(|s| s.needs_reconcile = true);
            }
        }
    }

    /// Re-run recalculation with the store's active rate.
    pub async fn reconcile(&self) -> Result<RecalcReport, RateError> {
        let _activation = self.activation.lock().await;
        let Some(active) = self.store.get_active().await? else {
            return Ok(RecalcReport::default());
        };
        let Some(recalculator) = self.recalculator.as_ref() else {
            return Ok(RecalcReport::default());
        };

        match recalculator.recalculate_on_rate_change(active.rate).await {
            Ok(report) => {
                self.publish(|s| {
                    s.last_recalc = Some(report);
                    s.needs_reconcile = report.has_failures();
                });
                Ok(report)
            }
            Err(err) => {
                self.publish(|s| s.needs_reconcile = true);
                Err(RateError::Store(err))
            }
        }
    }

    fn fail(&self, err: &RateError) {
        warn!(error = %err, "rate update failed, keeping previous rate");
        let message = err.to_string();
        self.publish(|s| {
            s.phase = RatePhase::Failed;
            s.loading = false;
            s.last_error = Some(message);
        });
    }

    /// Return to `Idle` once the outcome has been observed.
    pub fn acknowledge(&self) {
        let settled = matches!(
            self.state.borrow().phase,
            RatePhase::Activated | RatePhase::Failed
        );
        if settled {
            self.publish(|s| s.phase = RatePhase::Idle);
        }
    }

    pub async fn check_staleness(&self, threshold: Duration) -> Result<StalenessCheck, RateError> {
        let active = self.store.get_active().await?;
        let check = check_rate_staleness(active.as_ref(), threshold, self.clock.now());
        log_rate_staleness(&check);
        Ok(check)
    }

    /// True when there is no active rate or it is older than `threshold`.
    pub async fn is_stale(&self, threshold: Duration) -> Result<bool, RateError> {
        Ok(self.check_staleness(threshold).await?.is_stale)
    }

    /// The active record as persisted.
    pub async fn stored_rate(&self) -> Result<Option<RateRecord>, RateError> {
        Ok(self.store.get_active().await?)
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<RateRecord>, RateError> {
        Ok(self.store.get_history(limit).await?)
    }

    pub async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RateRecord>, RateError> {
        Ok(self.store.get_range(start, end).await?)
    }

    pub async fn latest_by_source(&self, source: &str) -> Result<Option<RateRecord>, RateError> {
        Ok(self.store.get_latest_by_source(source).await?)
    }

    /// Ask every configured source for its rate. Reporting only: nothing is
    /// stored or activated.
    pub async fn compare_sources(&self) -> Vec<SourceOutcome> {
        self.fetcher.fetch_all(self.fetcher.order()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{MemoryRateStore, RateSource, SourceError};

    struct FixedSource(&'static str, f64);

    #[async_trait::async_trait]
    impl RateSource for FixedSource {
        async fn fetch(&self) -> Result<f64, SourceError> {
            Ok(self.1)
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    fn manager_with(rate: f64) -> RateManager {
        let fetcher = FallbackFetcher::new(vec![Arc::new(FixedSource("a", rate))]);
        RateManager::new(Arc::new(MemoryRateStore::new()), fetcher)
            .with_bounds(RateBounds::new(1.0, 1000.0))
    }

    #[tokio::test]
    async fn refresh_moves_through_phases() {
        let manager = manager_with(36.5);
        assert_eq!(manager.snapshot().phase, RatePhase::Idle);

        let record = manager.refresh_rate(None).await.unwrap();
        assert_eq!(record.source, "a");

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.phase, RatePhase::Activated);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.current.map(|c| c.rate), Some(36.5));

        manager.acknowledge();
        assert_eq!(manager.snapshot().phase, RatePhase::Idle);
    }

    #[tokio::test]
    async fn out_of_bounds_fetch_fails_and_keeps_previous() {
        let manager = manager_with(5000.0);
        manager.set_manual_rate(36.0).await.unwrap();

        let err = manager.refresh_rate(None).await.unwrap_err();
        assert!(matches!(err, RateError::OutOfBounds { .. }));

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.phase, RatePhase::Failed);
        assert!(snapshot.last_error.is_some());
        assert_eq!(snapshot.current.map(|c| c.rate), Some(36.0));
        assert_eq!(manager.stored_rate().await.unwrap().map(|r| r.rate), Some(36.0));
    }

    #[tokio::test]
    async fn local_rate_does_not_touch_store() {
        let manager = manager_with(36.5);
        let current = manager.set_local_rate(38.0).unwrap();
        assert_eq!(current.record_id, None);
        assert_eq!(manager.current_rate().map(|c| c.rate), Some(38.0));
        assert!(manager.stored_rate().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_manual_input_is_rejected_before_store() {
        let manager = manager_with(36.5);
        assert!(matches!(
            manager.set_manual_rate_input("abc").await,
            Err(RateError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.set_manual_rate(-1.0).await,
            Err(RateError::InvalidRate(_))
        ));
        assert!(manager.history(10).await.unwrap().is_empty());
        assert_eq!(manager.snapshot().phase, RatePhase::Idle);
    }
}
