mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use ratebook::clock::ManualClock;
use ratebook::rates::{
    AutoRefresh, FallbackFetcher, MemoryRateStore, RateManager, RatePhase, RateStore,
    SourceError, MANUAL_SOURCE,
};
use support::MockRateSource;

const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);

#[tokio::test]
async fn manual_override_round_trip() -> Result<()> {
    let store = Arc::new(MemoryRateStore::new());
    let fetcher = FallbackFetcher::new(vec![MockRateSource::ok("bcv", 36.0).boxed()]);
    let manager = RateManager::new(store.clone(), fetcher);

    let fetched = manager.refresh_rate(None).await?;
    let manual = manager.set_manual_rate(42.0).await?;

    let current = manager.current_rate().expect("current rate");
    assert_eq!(current.rate, 42.0);
    assert_eq!(current.source, MANUAL_SOURCE);
    assert_eq!(current.record_id, Some(manual.id));

    let history = manager.history(10).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, manual.id);
    assert!(history[0].is_active);
    assert!(history[0].is_manual());
    assert_eq!(history[1].id, fetched.id);
    assert!(!history[1].is_active);
    Ok(())
}

#[tokio::test]
async fn staleness_follows_the_clock() -> Result<()> {
    let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(MemoryRateStore::new().with_clock(clock.clone()));
    let source = MockRateSource::ok("bcv", 36.8);
    let calls = source.calls();
    let manager = RateManager::new(store, FallbackFetcher::new(vec![source.boxed()]))
        .with_clock(clock.clone());

    assert!(manager.is_stale(THIRTY_MINUTES).await?, "no rate is stale");
    manager.set_manual_rate(36.5).await?;

    clock.advance(chrono::Duration::minutes(29));
    assert!(!manager.is_stale(THIRTY_MINUTES).await?);
    assert!(manager.refresh_if_stale(THIRTY_MINUTES).await?.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    clock.advance(chrono::Duration::minutes(2));
    let check = manager.check_staleness(THIRTY_MINUTES).await?;
    assert!(check.is_stale);
    assert_eq!(check.age, Some(Duration::from_secs(31 * 60)));

    let refreshed = manager
        .refresh_if_stale(THIRTY_MINUTES)
        .await?
        .expect("stale rate refreshed");
    assert_eq!(refreshed.rate, 36.8);
    assert_eq!(refreshed.created_at, start + chrono::Duration::minutes(31));
    assert!(!manager.is_stale(THIRTY_MINUTES).await?);
    Ok(())
}

#[tokio::test]
async fn concurrent_stale_checks_fetch_once() -> Result<()> {
    let source = MockRateSource::ok("slow", 37.0).with_delay(Duration::from_millis(100));
    let calls = source.calls();
    let manager = RateManager::new(
        Arc::new(MemoryRateStore::new()),
        FallbackFetcher::new(vec![source.boxed()]),
    );

    let (first, second) = tokio::join!(
        manager.refresh_if_stale(THIRTY_MINUTES),
        manager.refresh_if_stale(THIRTY_MINUTES)
    );

    let refreshed = [first?, second?].into_iter().flatten().count();
    assert_eq!(refreshed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn subscribers_see_activation() -> Result<()> {
    let manager = RateManager::new(
        Arc::new(MemoryRateStore::new()),
        FallbackFetcher::new(vec![MockRateSource::ok("bcv", 36.0).boxed()]),
    );
    let mut rx = manager.subscribe();

    let (tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
    let watcher = manager.on_change(move |snapshot| {
        let _ = tx.send(snapshot);
    });

    manager.refresh_rate(None).await?;

    assert!(rx.has_changed()?);
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.phase, RatePhase::Activated);
    assert_eq!(snapshot.current.as_ref().map(|c| c.rate), Some(36.0));
    assert!(snapshot.last_error.is_none());

    let delivered = tokio::time::timeout(Duration::from_secs(1), seen.recv())
        .await?
        .expect("callback delivered a snapshot");
    assert!(delivered.current.is_some() || delivered.loading);

    drop(manager);
    tokio::time::timeout(Duration::from_secs(1), watcher).await??;
    Ok(())
}

#[tokio::test]
async fn initialize_loads_persisted_rate() -> Result<()> {
    let store = Arc::new(MemoryRateStore::new());
    let record = store.insert_and_activate("pydolar", 36.9).await?;

    let manager = RateManager::new(store, FallbackFetcher::new(Vec::new()));
    assert!(manager.current_rate().is_none());

    let current = manager.initialize().await?.expect("loaded");
    assert_eq!(current.rate, 36.9);
    assert_eq!(current.record_id, Some(record.id));
    assert_eq!(manager.current_rate(), Some(current));
    Ok(())
}

#[tokio::test]
async fn auto_refresh_ticks_and_stops() -> Result<()> {
    let source = MockRateSource::ok("bcv", 36.0).with_delay(Duration::from_millis(20));
    let calls = source.calls();
    let manager = Arc::new(RateManager::new(
        Arc::new(MemoryRateStore::new()),
        FallbackFetcher::new(vec![source.boxed()]),
    ));

    // Zero staleness: every tick refreshes.
    let handle =
        AutoRefresh::new(manager.clone(), Duration::from_millis(10), Duration::ZERO).spawn();
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.stop().await;

    let after_stop = calls.load(Ordering::SeqCst);
    assert!(after_stop >= 2, "expected several ticks, got {after_stop}");
    assert_eq!(manager.snapshot().phase, RatePhase::Idle);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), after_stop, "no ticks after stop");

    let history = manager.history(usize::MAX).await?;
    assert_eq!(history.len(), after_stop);
    assert_eq!(history.iter().filter(|r| r.is_active).count(), 1);
    Ok(())
}

#[tokio::test]
async fn listeners_see_failure_before_acknowledgement() -> Result<()> {
    let manager = Arc::new(RateManager::new(
        Arc::new(MemoryRateStore::new()),
        FallbackFetcher::new(vec![MockRateSource::failing("bcv", SourceError::Timeout).boxed()]),
    ));

    let (tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
    let _watcher = manager.on_change(move |snapshot| {
        let _ = tx.send(snapshot);
    });

    AutoRefresh::new(manager.clone(), THIRTY_MINUTES, THIRTY_MINUTES)
        .run_cycle("test")
        .await;

    let mut phases = Vec::new();
    while phases.last() != Some(&RatePhase::Idle) {
        let snapshot = tokio::time::timeout(Duration::from_secs(1), seen.recv())
            .await?
            .expect("listener still attached");
        if snapshot.phase == RatePhase::Failed {
            assert!(snapshot.last_error.is_some());
        }
        phases.push(snapshot.phase);
    }
    assert_eq!(
        phases,
        vec![RatePhase::Fetching, RatePhase::Failed, RatePhase::Idle]
    );
    Ok(())
}
