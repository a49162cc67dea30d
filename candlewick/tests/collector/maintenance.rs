use std::sync::Arc;

use candlewick::{
    CandlewickError, Collector, InstrumentKey, ReconciliationMarker, SeriesStore, Timeframe,
};
use candlewick_mock::fixtures::series;
use candlewick_mock::DynamicMockProvider;
use chrono::TimeDelta;

use crate::helpers::{Harness, capped, dt, registry_of};

#[tokio::test]
async fn validate_all_reports_unexplained_gaps() {
    let h = Harness::new(&["btcusd", "ethusd"], capped(1_000, None));
    let start = dt(2024, 3, 5, 0, 0);
    let mut bars = series(Timeframe::H1, start, 3);
    bars.extend(series(Timeframe::H1, start + TimeDelta::hours(6), 2));
    h.store.insert("btcusd", Timeframe::H1, bars).await;

    let report = h.collector.validate_all(dt(2024, 3, 5, 8, 0)).await.unwrap();

    assert_eq!(report.len(), 2);
    let btc = report
        .iter()
        .find(|r| r.instrument.as_str() == "btcusd")
        .unwrap();
    assert_eq!(btc.gap_count, 1);
    assert_eq!(btc.gaps[0].missing, 3);
    assert!(btc.stale.is_none());
    let eth = report
        .iter()
        .find(|r| r.instrument.as_str() == "ethusd")
        .unwrap();
    assert!(eth.is_empty());
}

#[tokio::test]
async fn reset_series_removes_files_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let (provider, _ctl) = DynamicMockProvider::new_with_controller("dyn");
    let collector = Collector::builder()
        .with_provider(provider)
        .registry(registry_of(&["eurusd"]))
        .data_dir(dir.path().join("data"))
        .status_path(dir.path().join("status.json"))
        .build()
        .unwrap();
    let key = InstrumentKey::new("eurusd");
    let start = dt(2024, 3, 5, 0, 0);
    let store = collector.store();
    store
        .replace(&key, Timeframe::H1, &series(Timeframe::H1, start, 4))
        .await
        .unwrap();
    store
        .replace(&key, Timeframe::M5, &series(Timeframe::M5, start, 4))
        .await
        .unwrap();
    collector.status().record(&ReconciliationMarker {
        instrument: key.clone(),
        timeframe: Timeframe::H1,
        last_bar: start,
        updated_at: start,
    });

    let removed = collector.reset_series(&key, Some(Timeframe::H1)).await.unwrap();
    assert_eq!(removed, 1);
    assert!(!dir.path().join("data/1h/eurusd.csv").exists());
    assert!(dir.path().join("data/5m/eurusd.csv").exists());
    assert!(collector.status().get(&key, Timeframe::H1).is_none());

    let removed = collector.reset_series(&key, None).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.load(&key, Timeframe::M5).await.unwrap().is_empty());
}

#[tokio::test]
async fn reset_series_rejects_unknown_instruments() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let err = h
        .collector
        .reset_series(&InstrumentKey::new("nope"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CandlewickError::NotFound { .. }));
}

#[tokio::test]
async fn reset_status_clears_the_record_on_disk() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let at = dt(2024, 3, 5, 0, 0);
    h.collector.status().record(&ReconciliationMarker {
        instrument: InstrumentKey::new("btcusd"),
        timeframe: Timeframe::H1,
        last_bar: at,
        updated_at: at,
    });
    h.collector.status().flush().await.unwrap();

    h.collector.reset_status().await.unwrap();

    let raw = std::fs::read_to_string(h.dir.path().join("status.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc, serde_json::json!({}));
}

#[tokio::test]
async fn orphaned_series_lists_unregistered_keys() {
    let h = Harness::new(&["btcusd"], capped(1_000, None));
    let start = dt(2024, 3, 5, 0, 0);
    h.store.insert("btcusd", Timeframe::H1, series(Timeframe::H1, start, 2)).await;
    h.store.insert("delisted", Timeframe::H1, series(Timeframe::H1, start, 2)).await;

    let store: Arc<dyn SeriesStore> = h.collector.store();
    assert_eq!(store.keys(Timeframe::H1).await.unwrap().len(), 2);
    let orphans = h.collector.orphaned_series(Timeframe::H1).await.unwrap();
    assert_eq!(orphans, vec![InstrumentKey::new("delisted")]);
}
