use std::time::Duration;

use candlewick::{CandlewickError, QuotaConfig, QuotaConsumptionStrategy, ReconcileOutcome, Timeframe};
use candlewick_mock::MockBehavior;
use candlewick_mock::fixtures::synthetic;
use chrono::TimeDelta;

use crate::helpers::{Harness, capped, dt};

#[tokio::test]
async fn configured_quota_limits_provider_calls() {
    let h = Harness::with(&["btcusd", "ethusd"], capped(1_000, None), |b| {
        b.quota(QuotaConfig {
            limit: 1,
            window: Duration::from_secs(3_600),
            strategy: QuotaConsumptionStrategy::Unit,
        })
    });
    let now = dt(2024, 3, 6, 12, 0);
    let bars = synthetic(Timeframe::H1, now - TimeDelta::days(1), now);
    h.ctl.set_behavior("BTC-USD", MockBehavior::Return(bars.clone())).await;
    h.ctl.set_behavior("ETH-USD", MockBehavior::Return(bars)).await;

    let report = h.collector.tick(Timeframe::H1, now).await;

    assert_eq!(h.ctl.calls().await, 1);
    let seeded = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.outcome, ReconcileOutcome::Bootstrapped { .. }))
        .count();
    let blocked = report
        .outcomes
        .iter()
        .filter(|o| {
            matches!(
                o.outcome,
                ReconcileOutcome::Failed(CandlewickError::QuotaExceeded { .. })
            )
        })
        .count();
    assert_eq!((seeded, blocked), (1, 1));
}
