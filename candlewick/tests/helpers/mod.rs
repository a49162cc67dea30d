// Shared fixtures for the collector integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use candlewick::{
    ChunkDelay, Collector, CollectorBuilder, InstrumentKey, InstrumentRegistry, ProviderLimits,
    Timeframe,
};
use candlewick_mock::{DynamicMockController, DynamicMockProvider, MemorySeriesStore, MockOptions};
use tempfile::TempDir;

/// Construct a UTC `DateTime` from components for readability in tests.
pub fn dt(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> chrono::DateTime<chrono::Utc> {
    chrono::NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(hh, mm, 0))
        .expect("invalid date components")
        .and_utc()
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A registry holding only the named instruments from the standard universe.
pub fn registry_of(keys: &[&str]) -> InstrumentRegistry {
    let standard = InstrumentRegistry::standard().unwrap();
    let mut reg = InstrumentRegistry::new();
    for k in keys {
        let inst = standard.get(&InstrumentKey::new(k)).unwrap().clone();
        reg.register(inst).unwrap();
    }
    reg
}

/// Mock options with a per-request cap and optional retention, serving every timeframe.
pub fn capped(cap: usize, retention: Option<chrono::TimeDelta>) -> MockOptions {
    MockOptions {
        limits: ProviderLimits {
            max_bars_per_request: cap,
            retention,
        },
        unsupported: Vec::new(),
    }
}

/// A collector wired to a scripted provider and an in-memory store.
pub struct Harness {
    pub collector: Collector,
    pub store: Arc<MemorySeriesStore>,
    pub ctl: DynamicMockController,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(keys: &[&str], options: MockOptions) -> Self {
        Self::with(keys, options, |b| b)
    }

    pub fn with(
        keys: &[&str],
        options: MockOptions,
        tweak: impl FnOnce(CollectorBuilder) -> CollectorBuilder,
    ) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let (provider, ctl) = DynamicMockProvider::with_options("dyn", options);
        let store = Arc::new(MemorySeriesStore::new());
        let builder = Collector::builder()
            .with_provider(provider)
            .with_store(store.clone())
            .registry(registry_of(keys))
            .status_path(dir.path().join("status.json"))
            .chunk_delay(ChunkDelay {
                base_ms: 0,
                jitter_percent: 0,
            })
            .provider_timeout(Duration::from_secs(2))
            .timeframes(&[Timeframe::H1]);
        let collector = tweak(builder).build().unwrap();
        Self {
            collector,
            store,
            ctl,
            dir,
        }
    }
}
