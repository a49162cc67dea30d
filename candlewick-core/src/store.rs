use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::timeseries::merge::{MergeOutcome, merge_bars};
use crate::types::Bar;
use crate::{CandlewickError, InstrumentKey, Timeframe};

/// Persistent home of the per-(instrument, timeframe) series.
///
/// Implementations must make [`replace`](Self::replace) atomic: a reader sees
/// either the old series or the new one, never a partial write.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Read a series as stored. Missing series read as empty.
    async fn load(&self, key: &InstrumentKey, timeframe: Timeframe)
    -> Result<Vec<Bar>, CandlewickError>;

    /// Overwrite a series with `bars`.
    async fn replace(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<(), CandlewickError>;

    /// Delete a series. Returns whether anything was removed.
    async fn reset(&self, key: &InstrumentKey, timeframe: Timeframe)
    -> Result<bool, CandlewickError>;

    /// Instruments with a stored series at `timeframe`, in key order.
    async fn keys(&self, timeframe: Timeframe) -> Result<Vec<InstrumentKey>, CandlewickError>;

    /// Timestamp of the newest stored bar.
    async fn tail(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
    ) -> Result<Option<DateTime<Utc>>, CandlewickError> {
        Ok(self
            .load(key, timeframe)
            .await?
            .iter()
            .map(|b| b.ts)
            .max())
    }

    /// Fold `incoming` into the stored series and persist the result if it
    /// changed. See [`merge_bars`] for the merge rules.
    async fn merge(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
        incoming: Vec<Bar>,
    ) -> Result<MergeOutcome, CandlewickError> {
        let existing = self.load(key, timeframe).await?;
        let outcome = merge_bars(existing, incoming);
        if outcome.changed > 0 {
            self.replace(key, timeframe, &outcome.bars).await?;
        }
        Ok(outcome)
    }
}
