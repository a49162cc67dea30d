use candlewick::{CandlewickError, FetchSpan, InstrumentKey, ProviderLimits, ReconcileOutcome, Timeframe};
use candlewick_mock::fixtures::{series, synthetic};
use candlewick_mock::{MockBehavior, MockOptions};
use chrono::TimeDelta;

use crate::helpers::{Harness, dt};

fn without(tf: Timeframe, cap: usize) -> MockOptions {
    MockOptions {
        limits: ProviderLimits::unbounded(cap),
        unsupported: vec![tf],
    }
}

#[tokio::test]
async fn four_hour_bars_are_built_from_hourly() {
    let h = Harness::new(&["btcusd"], without(Timeframe::H4, 10_000));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 4, 0, 0);
    let now = dt(2024, 3, 5, 0, 0);
    let hourly = synthetic(Timeframe::H1, tail, now + TimeDelta::hours(4));
    h.store.insert("btcusd", Timeframe::H4, series(Timeframe::H4, tail, 1)).await;
    h.ctl.set_behavior("BTC-USD", MockBehavior::Return(hourly.clone())).await;

    let out = h.collector.reconcile(&key, Timeframe::H4, now).await;

    assert!(matches!(out, ReconcileOutcome::Backfilled { merged: 5, .. }), "{out:?}");
    let reqs = h.ctl.requests().await;
    assert!(reqs.iter().all(|(_, r)| r.timeframe == Timeframe::H1));

    let stored = h.store.get("btcusd", Timeframe::H4).await;
    let stamps: Vec<_> = stored.iter().map(|b| b.ts).collect();
    assert_eq!(
        stamps,
        vec![
            tail,
            dt(2024, 3, 4, 4, 0),
            dt(2024, 3, 4, 8, 0),
            dt(2024, 3, 4, 12, 0),
            dt(2024, 3, 4, 16, 0),
            dt(2024, 3, 4, 20, 0),
        ]
    );

    let bucket: Vec<_> = hourly
        .iter()
        .filter(|b| b.ts >= dt(2024, 3, 4, 4, 0) && b.ts < dt(2024, 3, 4, 8, 0))
        .collect();
    let four = &stored[1];
    assert_eq!(four.open, bucket[0].open);
    assert_eq!(four.close, bucket[3].close);
    assert_eq!(four.high, bucket.iter().map(|b| b.high).max().unwrap());
    assert_eq!(four.low, bucket.iter().map(|b| b.low).min().unwrap());
    assert_eq!(four.volume, bucket.iter().map(|b| b.volume).sum::<u64>());
}

#[tokio::test]
async fn resampled_chunks_respect_the_source_cap() {
    let h = Harness::new(&["btcusd"], without(Timeframe::H4, 40));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 1, 0, 0);
    let now = dt(2024, 3, 5, 0, 0);
    h.store.insert("btcusd", Timeframe::H4, series(Timeframe::H4, tail, 1)).await;
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, tail, now)),
        )
        .await;

    let out = h.collector.reconcile(&key, Timeframe::H4, now).await;

    assert!(matches!(out, ReconcileOutcome::Backfilled { fetched_chunks: 3, .. }), "{out:?}");
    for (_, req) in h.ctl.requests().await {
        let FetchSpan::Window { start, end } = req.span else {
            panic!("unexpected lookback");
        };
        assert!((end - start).num_hours() <= 40);
    }
}

#[tokio::test]
async fn timeframe_without_a_source_is_unsupported() {
    let h = Harness::new(&["btcusd"], without(Timeframe::D1, 1_000));
    let key = InstrumentKey::new("btcusd");
    let tail = dt(2024, 3, 1, 0, 0);
    h.store.insert("btcusd", Timeframe::D1, series(Timeframe::D1, tail, 1)).await;

    let out = h
        .collector
        .reconcile(&key, Timeframe::D1, dt(2024, 3, 5, 0, 0))
        .await;

    assert!(
        matches!(out, ReconcileOutcome::Failed(CandlewickError::Unsupported { .. })),
        "{out:?}"
    );
    assert_eq!(h.ctl.calls().await, 0);
}
