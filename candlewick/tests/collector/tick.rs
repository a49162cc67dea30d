use std::time::Duration;

use candlewick::{
    CandlewickError, InstrumentKey, InstrumentRegistry, ReconcileOutcome, StatusStore, Timeframe,
};
use candlewick_mock::MockBehavior;
use candlewick_mock::fixtures::synthetic;
use chrono::TimeDelta;

use crate::helpers::{Harness, capped, dt};

#[tokio::test]
async fn tick_bounds_provider_calls_in_flight() {
    let standard = InstrumentRegistry::standard().unwrap();
    let keys: Vec<String> = standard.iter().map(|i| i.key().to_string()).collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    let h = Harness::with(&keys, capped(1_000, None), |b| b.max_in_flight(3));
    let now = dt(2024, 3, 6, 12, 0);
    let bars = synthetic(Timeframe::H1, now - TimeDelta::days(2), now);
    for inst in standard.iter() {
        h.ctl
            .set_behavior(
                inst.provider_symbol(),
                MockBehavior::Delay(Duration::from_millis(20), bars.clone()),
            )
            .await;
    }

    let report = h.collector.tick(Timeframe::H1, now).await;

    assert_eq!(report.outcomes.len(), standard.len());
    assert_eq!(report.failures(), 0);
    assert!(report.status_error.is_none());
    let peak = h.ctl.peak_in_flight();
    assert!(peak <= 3, "peak in flight was {peak}");
    assert!(peak >= 1);

    let reopened = StatusStore::open(h.dir.path().join("status.json")).unwrap();
    assert_eq!(reopened.snapshot().len(), standard.len());
    assert_eq!(
        reopened.get(&InstrumentKey::new("eurusd"), Timeframe::H1),
        Some(now)
    );
}

#[tokio::test]
async fn one_failing_instrument_does_not_block_the_rest() {
    let h = Harness::new(&["btcusd", "ethusd"], capped(1_000, None));
    let now = dt(2024, 3, 6, 12, 0);
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, now - TimeDelta::days(1), now)),
        )
        .await;
    h.ctl
        .set_behavior(
            "ETH-USD",
            MockBehavior::Fail(CandlewickError::provider("dyn", "down")),
        )
        .await;

    let report = h.collector.tick(Timeframe::H1, now).await;

    assert_eq!(report.failures(), 1);
    let btc = report
        .outcomes
        .iter()
        .find(|o| o.instrument.as_str() == "btcusd")
        .unwrap();
    assert!(matches!(btc.outcome, ReconcileOutcome::Bootstrapped { .. }));
    let status = h.collector.status();
    assert!(status.get(&InstrumentKey::new("btcusd"), Timeframe::H1).is_some());
    assert!(status.get(&InstrumentKey::new("ethusd"), Timeframe::H1).is_none());
}

#[tokio::test]
async fn status_write_failure_is_reported_not_fatal() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let now = dt(2024, 3, 6, 12, 0);
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, now - TimeDelta::days(1), now)),
        )
        .await;
    // a directory where the temporary file should go
    std::fs::create_dir(h.dir.path().join("status.json.tmp")).unwrap();

    let report = h.collector.tick(Timeframe::H1, now).await;

    assert!(matches!(
        report.status_error,
        Some(CandlewickError::Persistence { .. })
    ));
    assert!(matches!(
        report.outcomes[0].outcome,
        ReconcileOutcome::Bootstrapped { .. }
    ));
    assert_eq!(h.store.get("btcusd", Timeframe::H1).await.len(), 1);
    assert!(!h.dir.path().join("status.json").exists());
}

#[tokio::test]
async fn due_timeframes_run_as_one_batch() {
    let h = Harness::with(&["btcusd"], capped(1_000, None), |b| {
        b.max_in_flight(4).timeframes(&[Timeframe::H1, Timeframe::D1])
    });
    let now = dt(2024, 3, 6, 12, 0);
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Delay(
                Duration::from_millis(50),
                synthetic(Timeframe::H1, now - TimeDelta::days(3), now),
            ),
        )
        .await;

    let reports = h
        .collector
        .tick_all(&[Timeframe::H1, Timeframe::D1], now)
        .await;

    let order: Vec<Timeframe> = reports.iter().map(|r| r.timeframe).collect();
    assert_eq!(order, vec![Timeframe::H1, Timeframe::D1]);
    assert!(reports.iter().all(|r| r.failures() == 0 && r.status_error.is_none()));
    // both timeframes were in flight together
    assert_eq!(h.ctl.peak_in_flight(), 2);

    let reopened = StatusStore::open(h.dir.path().join("status.json")).unwrap();
    let key = InstrumentKey::new("btcusd");
    assert_eq!(reopened.get(&key, Timeframe::H1), Some(now));
    assert_eq!(reopened.get(&key, Timeframe::D1), Some(now));
}

#[tokio::test]
async fn batch_status_failure_is_reported_on_every_timeframe() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let now = dt(2024, 3, 6, 12, 0);
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, now - TimeDelta::days(3), now)),
        )
        .await;
    std::fs::create_dir(h.dir.path().join("status.json.tmp")).unwrap();

    let reports = h
        .collector
        .tick_all(&[Timeframe::H1, Timeframe::D1], now)
        .await;

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!(matches!(
            report.status_error,
            Some(CandlewickError::Persistence { .. })
        ));
    }
}
