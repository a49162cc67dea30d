use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use candlewick_core::{Bar, CandlewickError, InstrumentKey, SeriesStore, Timeframe};

/// Series kept in a map, for engine tests that do not care about files.
#[derive(Default)]
pub struct MemorySeriesStore {
    series: Mutex<HashMap<(InstrumentKey, Timeframe), Vec<Bar>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemorySeriesStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a series without counting it as a write.
    pub async fn insert(&self, key: impl Into<InstrumentKey>, timeframe: Timeframe, bars: Vec<Bar>) {
        self.series.lock().await.insert((key.into(), timeframe), bars);
    }

    /// A copy of the stored series, empty if absent.
    pub async fn get(&self, key: impl Into<InstrumentKey>, timeframe: Timeframe) -> Vec<Bar> {
        self.series
            .lock()
            .await
            .get(&(key.into(), timeframe))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of successful `replace` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every following `replace` fail with a persistence error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SeriesStore for MemorySeriesStore {
    async fn load(&self, key: &InstrumentKey, timeframe: Timeframe) -> Result<Vec<Bar>, CandlewickError> {
        Ok(self
            .series
            .lock()
            .await
            .get(&(key.clone(), timeframe))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<(), CandlewickError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CandlewickError::persistence(
                format!("memory://{timeframe}/{key}"),
                "writes disabled",
            ));
        }
        self.series
            .lock()
            .await
            .insert((key.clone(), timeframe), bars.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn keys(&self, timeframe: Timeframe) -> Result<Vec<InstrumentKey>, CandlewickError> {
        let mut keys: Vec<InstrumentKey> = self
            .series
            .lock()
            .await
            .keys()
            .filter(|(_, tf)| *tf == timeframe)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn reset(&self, key: &InstrumentKey, timeframe: Timeframe) -> Result<bool, CandlewickError> {
        Ok(self
            .series
            .lock()
            .await
            .remove(&(key.clone(), timeframe))
            .is_some())
    }
}
