//! Background auto-refresh of the active rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RateManager;

type DelayFn = Box<dyn Fn(Duration) -> Duration + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshCommand {
    RefreshNow,
    Stop,
}

/// Periodically asks the manager whether the rate is stale and refreshes it.
///
/// Each cycle runs to completion before the next sleep starts, and the
/// manager's in-flight guard keeps cycles from overlapping with fetches
/// started elsewhere.
pub struct AutoRefresh {
    manager: Arc<RateManager>,
    interval: Duration,
    staleness: Duration,
    delay: DelayFn,
}

impl AutoRefresh {
    pub fn new(manager: Arc<RateManager>, interval: Duration, staleness: Duration) -> Self {
        Self {
            manager,
            interval,
            staleness,
            delay: Box::new(|interval| interval),
        }
    }

    /// Override how the next sleep is derived from the interval (e.g. jitter).
    pub fn with_delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        self.delay = Box::new(delay);
        self
    }

    /// One check-and-refresh cycle.
    pub async fn run_cycle(&self, reason: &str) {
        debug!(reason, "auto refresh cycle");
        match self.manager.refresh_if_stale(self.staleness).await {
            Ok(Some(record)) => {
                info!(reason, source = %record.source, rate = record.rate, "rate refreshed");
            }
            Ok(None) => {
                if self.manager.snapshot().needs_reconcile {
                    match self.manager.reconcile().await {
                        Ok(report) => info!(
                            updated = report.updated,
                            failed = report.failed,
                            "reconciled receivables"
                        ),
                        Err(err) => warn!(error = %err, "reconcile failed"),
                    }
                }
            }
            Err(err) => warn!(reason, error = %err, "auto refresh failed"),
        }
        self.manager.acknowledge();
    }

    pub fn spawn(self) -> AutoRefreshHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(self.run(cmd_rx));
        AutoRefreshHandle { cmd_tx, task }
    }

    async fn run(self, mut cmd_rx: mpsc::Receiver<RefreshCommand>) {
        info!(
            interval = %crate::duration::format_duration(self.interval),
            staleness = %crate::duration::format_duration(self.staleness),
            "auto refresh started"
        );

        loop {
            let sleep = tokio::time::sleep((self.delay)(self.interval));
            tokio::pin!(sleep);

            tokio::select! {
                _ = &mut sleep => self.run_cycle("scheduled").await,
                cmd = cmd_rx.recv() => match cmd {
                    Some(RefreshCommand::RefreshNow) => self.run_cycle("manual").await,
                    Some(RefreshCommand::Stop) | None => break,
                },
            }
        }

        info!("auto refresh stopped");
    }
}

/// Control handle for a spawned [`AutoRefresh`]. Dropping it stops the task
/// after the current cycle.
pub struct AutoRefreshHandle {
    cmd_tx: mpsc::Sender<RefreshCommand>,
    task: JoinHandle<()>,
}

impl AutoRefreshHandle {
    /// Run a cycle now instead of waiting for the timer.
    pub async fn refresh_now(&self) {
        let _ = self.cmd_tx.send(RefreshCommand::RefreshNow).await;
    }

    /// Stop the task and wait for any running cycle to finish.
    pub async fn stop(self) {
        let _ = self.cmd_tx.send(RefreshCommand::Stop).await;
        if let Err(err) = self.task.await {
            warn!(error = %err, "auto refresh task ended abnormally");
        }
    }
}
