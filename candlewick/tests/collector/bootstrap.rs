use std::time::Duration;

use candlewick::{CandlewickError, FetchSpan, InstrumentKey, ReconcileOutcome, Timeframe};
use candlewick_mock::MockBehavior;
use candlewick_mock::fixtures::synthetic;
use chrono::TimeDelta;

use crate::helpers::{Harness, capped, dt};

#[tokio::test]
async fn empty_series_is_seeded_with_latest_closed_bar() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let key = InstrumentKey::new("btcusd");
    let now = dt(2024, 3, 5, 12, 0);
    // includes the still-open 12:00 bar
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(
                Timeframe::H1,
                now - TimeDelta::days(7),
                now + TimeDelta::hours(1),
            )),
        )
        .await;

    let out = h.collector.reconcile(&key, Timeframe::H1, now).await;

    match out {
        ReconcileOutcome::Bootstrapped { merged, marker } => {
            assert_eq!(merged, 1);
            assert_eq!(marker.last_bar, dt(2024, 3, 5, 11, 0));
            assert_eq!(marker.updated_at, now);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let reqs = h.ctl.requests().await;
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].1.span, FetchSpan::Lookback(TimeDelta::days(7)));
    assert_eq!(h.store.get("btcusd", Timeframe::H1).await.len(), 1);
}

#[tokio::test]
async fn bootstrap_history_seeds_a_full_window() {
    let h = Harness::with(&["btcusd"], capped(1_000, None), |b| {
        b.bootstrap_history(Some(Duration::from_secs(24 * 3_600)))
    });
    let key = InstrumentKey::new("btcusd");
    let now = dt(2024, 3, 5, 12, 0);
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, now - TimeDelta::days(3), now)),
        )
        .await;

    let out = h.collector.reconcile(&key, Timeframe::H1, now).await;

    assert!(
        matches!(out, ReconcileOutcome::Bootstrapped { merged: 24, .. }),
        "unexpected outcome: {out:?}"
    );
    let stored = h.store.get("btcusd", Timeframe::H1).await;
    assert_eq!(stored.first().unwrap().ts, now - TimeDelta::hours(24));
    assert_eq!(stored.last().unwrap().ts, now - TimeDelta::hours(1));
}

#[tokio::test]
async fn bootstrap_without_data_fails_and_writes_nothing() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let key = InstrumentKey::new("btcusd");

    let out = h
        .collector
        .reconcile(&key, Timeframe::H1, dt(2024, 3, 5, 12, 0))
        .await;

    assert!(
        matches!(out, ReconcileOutcome::Failed(CandlewickError::NoData { .. })),
        "unexpected outcome: {out:?}"
    );
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn up_to_date_series_fetches_latest_bar_only() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let key = InstrumentKey::new("btcusd");
    let now = dt(2024, 3, 5, 12, 30);
    let bars = synthetic(Timeframe::H1, now - TimeDelta::days(1), now);
    let stored: Vec<_> = bars
        .iter()
        .filter(|b| b.ts <= dt(2024, 3, 5, 11, 0))
        .cloned()
        .collect();
    h.store.insert("btcusd", Timeframe::H1, stored).await;
    h.ctl.set_behavior("BTC-USD", MockBehavior::Return(bars)).await;

    let out = h.collector.reconcile(&key, Timeframe::H1, now).await;

    assert_eq!(out, ReconcileOutcome::UpToDate);
    let reqs = h.ctl.requests().await;
    assert_eq!(reqs.len(), 1);
    assert!(matches!(reqs[0].1.span, FetchSpan::Lookback(_)));
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn incremental_no_data_is_not_a_failure() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let key = InstrumentKey::new("btcusd");
    let now = dt(2024, 3, 5, 12, 30);
    h.store
        .insert(
            "btcusd",
            Timeframe::H1,
            synthetic(Timeframe::H1, dt(2024, 3, 5, 9, 0), dt(2024, 3, 5, 12, 0)),
        )
        .await;
    h.ctl.set_behavior("BTC-USD", MockBehavior::NoData).await;

    let out = h.collector.reconcile(&key, Timeframe::H1, now).await;

    assert_eq!(out, ReconcileOutcome::UpToDate);
}
