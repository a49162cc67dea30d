use std::sync::Arc;
use std::time::Duration;

use candlewick::{Timeframe, next_due};
use candlewick_mock::MockBehavior;
use candlewick_mock::fixtures::synthetic;
use chrono::{TimeDelta, Utc};

use crate::helpers::{Harness, capped, dt};

#[test]
fn next_due_lands_on_the_following_boundary() {
    let cases = [
        (Timeframe::M1, dt(2024, 3, 6, 10, 2), dt(2024, 3, 6, 10, 3)),
        (Timeframe::M5, dt(2024, 3, 6, 10, 2), dt(2024, 3, 6, 10, 5)),
        (Timeframe::M5, dt(2024, 3, 6, 10, 5), dt(2024, 3, 6, 10, 10)),
        (Timeframe::M15, dt(2024, 3, 6, 10, 59), dt(2024, 3, 6, 11, 0)),
        (Timeframe::H1, dt(2024, 3, 6, 23, 30), dt(2024, 3, 7, 0, 0)),
        (Timeframe::H4, dt(2024, 3, 6, 1, 0), dt(2024, 3, 6, 4, 0)),
        (Timeframe::D1, dt(2024, 3, 6, 0, 0), dt(2024, 3, 7, 0, 0)),
        // Wednesday to the next Monday
        (Timeframe::W1, dt(2024, 3, 6, 9, 0), dt(2024, 3, 11, 0, 0)),
        (Timeframe::W1, dt(2024, 3, 11, 0, 0), dt(2024, 3, 18, 0, 0)),
        (Timeframe::Mo1, dt(2024, 3, 15, 8, 0), dt(2024, 4, 1, 0, 0)),
        (Timeframe::Mo1, dt(2024, 12, 31, 23, 0), dt(2025, 1, 1, 0, 0)),
        (Timeframe::Mo3, dt(2024, 2, 10, 0, 0), dt(2024, 4, 1, 0, 0)),
        (Timeframe::Mo3, dt(2024, 12, 5, 0, 0), dt(2025, 1, 1, 0, 0)),
    ];
    for (tf, now, want) in cases {
        assert_eq!(next_due(tf, now), want, "{tf} at {now}");
    }
}

#[tokio::test]
async fn spawned_driver_collects_until_stopped() {
    let h = Harness::with(&["btcusd"], capped(1_000, None), |b| {
        b.tick_interval(Duration::from_millis(10))
            .timeframes(&[Timeframe::H1, Timeframe::D1])
    });
    let now = Utc::now();
    h.ctl
        .set_behavior(
            "BTC-USD",
            MockBehavior::Return(synthetic(Timeframe::H1, now - TimeDelta::days(3), now)),
        )
        .await;
    let store = Arc::clone(&h.store);
    let collector = Arc::new(h.collector);

    let handle = Arc::clone(&collector).spawn();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());
    handle.stop().await;

    assert!(h.ctl.calls().await >= 2);
    assert_eq!(store.get("btcusd", Timeframe::H1).await.len(), 1);
    assert!(
        collector
            .status()
            .get(&"btcusd".into(), Timeframe::H1)
            .is_some()
    );
}

#[tokio::test]
async fn stop_interrupts_the_idle_sleep() {
    let h = Harness::with(&["btcusd"], capped(1_000, None), |b| {
        b.tick_interval(Duration::from_secs(3_600))
    });
    let collector = Arc::new(h.collector);
    let handle = collector.spawn();
    tokio::time::timeout(Duration::from_secs(2), handle.stop())
        .await
        .expect("driver did not stop");
}
