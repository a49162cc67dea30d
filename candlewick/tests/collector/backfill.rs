use std::time::Duration;

use candlewick::{CandlewickError, FetchSpan, InstrumentKey, ReconcileOutcome, Timeframe};
use candlewick_mock::MockBehavior;
use candlewick_mock::fixtures::{series, synthetic};
use chrono::TimeDelta;

use crate::helpers::{Harness, capped, dt};

fn windows(reqs: &[(String, candlewick::FetchRequest)]) -> Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> {
    reqs.iter()
        .map(|(_, r)| match r.span {
            FetchSpan::Window { start, end } => (start, end),
            FetchSpan::Lookback(_) => panic!("unexpected lookback request"),
        })
        .collect()
}

#[tokio::test]
async fn large_gap_is_split_into_capped_chunks() {
    let h = Harness::new(&["btcusd"], capped(8_000, None));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 1, 0, 0);
    let now = tail + TimeDelta::minutes(10_000);
    h.store.insert("btcusd", Timeframe::M1, series(Timeframe::M1, tail, 1)).await;
    h.ctl
        .set_behavior("BTC-USD", MockBehavior::Return(synthetic(Timeframe::M1, tail, now)))
        .await;

    let out = h.collector.reconcile(&key, Timeframe::M1, now).await;

    let reqs = h.ctl.requests().await;
    let spans = windows(&reqs);
    assert!(spans.len() >= 2, "expected at least two chunks, got {}", spans.len());
    for (start, end) in &spans {
        assert!((*end - *start).num_minutes() <= 8_000);
    }
    assert_eq!(spans[0].0, tail + TimeDelta::minutes(1));
    assert_eq!(spans.last().unwrap().1, now + TimeDelta::minutes(1));

    let stored = h.store.get("btcusd", Timeframe::M1).await;
    assert_eq!(stored.len(), 10_000);
    assert!(stored.windows(2).all(|w| w[0].ts < w[1].ts));
    match out {
        ReconcileOutcome::Backfilled {
            fetched_chunks,
            skipped_chunks,
            merged,
            marker,
        } => {
            assert_eq!(fetched_chunks, spans.len());
            assert_eq!(skipped_chunks, 0);
            assert_eq!(merged, 9_999);
            assert_eq!(marker.unwrap().last_bar, now - TimeDelta::minutes(1));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn weekend_chunks_are_skipped_without_a_request() {
    let h = Harness::new(&["eurusd"], capped(24, None));
    let key = InstrumentKey::new("eurusd");
    // Friday 21:00 is the last hourly bar before the 22:00 UTC close.
    let tail = dt(2024, 3, 8, 21, 0);
    let now = dt(2024, 3, 11, 0, 0);
    h.store.insert("eurusd", Timeframe::H1, series(Timeframe::H1, tail, 1)).await;
    h.ctl
        .set_behavior(
            "EURUSD=X",
            MockBehavior::Return(synthetic(Timeframe::H1, dt(2024, 3, 10, 22, 0), now)),
        )
        .await;

    let out = h.collector.reconcile(&key, Timeframe::H1, now).await;

    let spans = windows(&h.ctl.requests().await);
    assert_eq!(spans, vec![(dt(2024, 3, 10, 22, 0), dt(2024, 3, 11, 1, 0))]);
    match out {
        ReconcileOutcome::Backfilled {
            fetched_chunks,
            skipped_chunks,
            merged,
            ..
        } => {
            assert_eq!((fetched_chunks, skipped_chunks, merged), (1, 2, 2));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn fully_closed_gap_makes_no_calls() {
    let h = Harness::new(&["eurusd"], capped(24, None));
    let key = InstrumentKey::new("eurusd");
    let tail = dt(2024, 3, 8, 21, 0);
    h.store.insert("eurusd", Timeframe::H1, series(Timeframe::H1, tail, 1)).await;

    let out = h
        .collector
        .reconcile(&key, Timeframe::H1, dt(2024, 3, 10, 21, 0))
        .await;

    assert_eq!(out, ReconcileOutcome::UpToDate);
    assert_eq!(h.ctl.calls().await, 0);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn chunks_past_retention_are_skipped() {
    let h = Harness::new(&["btcusd"], capped(24, Some(TimeDelta::hours(48))));
    let key = InstrumentKey::new("btcusd");
    let now = dt(2024, 3, 10, 0, 0);
    let tail = now - TimeDelta::hours(120);
    h.store.insert("btcusd", Timeframe::H1, series(Timeframe::H1, tail, 1)).await;
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, tail, now)),
        )
        .await;

    let out = h.collector.reconcile(&key, Timeframe::H1, now).await;

    let spans = windows(&h.ctl.requests().await);
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[0].0, now - TimeDelta::hours(71));
    match out {
        ReconcileOutcome::Backfilled {
            fetched_chunks,
            skipped_chunks,
            merged,
            ..
        } => assert_eq!((fetched_chunks, skipped_chunks, merged), (3, 2, 71)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn empty_chunk_counts_as_fetched_and_backfill_continues() {
    let h = Harness::new(&["btcusd"], capped(12, None));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 5, 10, 0);
    let now = tail + TimeDelta::minutes(5 * 36);
    let bars = synthetic(Timeframe::M5, tail, now);
    h.store.insert("btcusd", Timeframe::M5, series(Timeframe::M5, tail, 1)).await;
    h.ctl.push_behavior("BTC-USD", MockBehavior::Return(bars.clone())).await;
    h.ctl.push_behavior("BTC-USD", MockBehavior::NoData).await;
    h.ctl.push_behavior("BTC-USD", MockBehavior::Return(bars)).await;

    let out = h.collector.reconcile(&key, Timeframe::M5, now).await;

    match out {
        ReconcileOutcome::Backfilled {
            fetched_chunks,
            merged,
            ..
        } => {
            assert_eq!(fetched_chunks, 3);
            // first chunk: 12 bars; third: 11 closed bars
            assert_eq!(merged, 23);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(h.store.get("btcusd", Timeframe::M5).await.len(), 24);
}

#[tokio::test]
async fn failing_chunk_leaves_series_unchanged() {
    let h = Harness::new(&["btcusd"], capped(12, None));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 5, 10, 0);
    let now = tail + TimeDelta::minutes(5 * 37);
    let seed = series(Timeframe::M5, tail - TimeDelta::minutes(20), 5);
    h.store.insert("btcusd", Timeframe::M5, seed.clone()).await;
    h.ctl
        .push_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::M5, tail, now)),
        )
        .await;
    h.ctl
        .push_behavior(
            "BTC-USD",
            MockBehavior::Fail(CandlewickError::provider("dyn", "boom")),
        )
        .await;

    let out = h.collector.reconcile(&key, Timeframe::M5, now).await;

    assert!(
        matches!(out, ReconcileOutcome::Failed(CandlewickError::Provider { .. })),
        "unexpected outcome: {out:?}"
    );
    assert_eq!(h.ctl.calls().await, 2);
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.store.get("btcusd", Timeframe::M5).await, seed);
}

#[tokio::test]
async fn hung_provider_times_out() {
    let h = Harness::with(&["btcusd"], capped(100, None), |b| {
        b.provider_timeout(Duration::from_millis(50))
    });
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 5, 10, 0);
    h.store.insert("btcusd", Timeframe::H1, series(Timeframe::H1, tail, 1)).await;
    h.ctl.set_behavior("BTC-USD", MockBehavior::Hang).await;

    let out = h
        .collector
        .reconcile(&key, Timeframe::H1, tail + TimeDelta::hours(5))
        .await;

    assert!(
        matches!(out, ReconcileOutcome::Failed(CandlewickError::ProviderTimeout { .. })),
        "unexpected outcome: {out:?}"
    );
}

#[tokio::test]
async fn malformed_bars_are_dropped_from_chunks() {
    let h = Harness::new(&["btcusd"], capped(100, None));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 5, 10, 0);
    let now = tail + TimeDelta::hours(4);
    let mut bars = synthetic(Timeframe::H1, tail, now);
    // high below low
    let bar = &mut bars[1];
    std::mem::swap(&mut bar.high, &mut bar.low);
    let bad_ts = bars[1].ts;
    h.store.insert("btcusd", Timeframe::H1, series(Timeframe::H1, tail, 1)).await;
    h.ctl.set_behavior("BTC-USD", MockBehavior::Return(bars)).await;

    let out = h.collector.reconcile(&key, Timeframe::H1, now).await;

    assert!(matches!(out, ReconcileOutcome::Backfilled { merged: 2, .. }), "{out:?}");
    let stored = h.store.get("btcusd", Timeframe::H1).await;
    assert!(stored.iter().all(|b| b.ts != bad_ts));
}

#[tokio::test]
async fn rerun_after_backfill_is_a_no_op() {
    let h = Harness::new(&["btcusd"], capped(100, None));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 5, 10, 0);
    let now = tail + TimeDelta::hours(6);
    h.store.insert("btcusd", Timeframe::H1, series(Timeframe::H1, tail, 1)).await;
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, tail, now)),
        )
        .await;

    let first = h.collector.reconcile(&key, Timeframe::H1, now).await;
    assert!(first.marker().is_some());
    let after_first = h.store.get("btcusd", Timeframe::H1).await;
    let writes = h.store.writes();

    let second = h.collector.reconcile(&key, Timeframe::H1, now).await;
    assert_eq!(second, ReconcileOutcome::UpToDate);
    assert_eq!(h.store.writes(), writes);
    assert_eq!(h.store.get("btcusd", Timeframe::H1).await, after_first);
}

#[tokio::test]
async fn unknown_instrument_fails_with_not_found() {
    let h = Harness::new(&["btcusd"], capped(100, None));
    let out = h
        .collector
        .reconcile(&InstrumentKey::new("nope"), Timeframe::H1, dt(2024, 3, 5, 10, 0))
        .await;
    assert!(matches!(out, ReconcileOutcome::Failed(CandlewickError::NotFound { .. })));
}
