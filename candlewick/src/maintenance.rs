use candlewick_core::{CandlewickError, GapDetector, InstrumentKey, SeriesHealth, Timeframe};
use chrono::{DateTime, Utc};

use crate::collector::Collector;

impl Collector {
    /// Delete stored series of `key` at `timeframe`, or at every timeframe
    /// when `None`, and drop the matching status entries.
    ///
    /// Returns the number of series files removed.
    ///
    /// # Errors
    /// Returns `CandlewickError::NotFound` for unknown instruments and
    /// `CandlewickError::Persistence` if a file or the status record cannot be
    /// written.
    pub async fn reset_series(
        &self,
        key: &InstrumentKey,
        timeframe: Option<Timeframe>,
    ) -> Result<usize, CandlewickError> {
        self.registry.require(key)?;
        let targets: Vec<Timeframe> =
            timeframe.map_or_else(|| Timeframe::ALL.to_vec(), |tf| vec![tf]);
        let mut removed = 0;
        for tf in targets {
            if self.store.reset(key, tf).await? {
                removed += 1;
            }
        }
        if self.status.remove(key, timeframe) {
            self.status.flush().await?;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(instrument = %key, removed, "series reset");
        Ok(removed)
    }

    /// Clear the whole status record. Series files are untouched.
    ///
    /// # Errors
    /// Returns `CandlewickError::Persistence` if the record cannot be written.
    pub async fn reset_status(&self) -> Result<(), CandlewickError> {
        self.status.clear();
        self.status.flush().await
    }

    /// Inspect every registered instrument at every configured timeframe.
    ///
    /// Gaps older than the provider's retention are not reported, since no
    /// backfill could fill them.
    ///
    /// # Errors
    /// Returns the first store error encountered.
    pub async fn validate_all(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeriesHealth>, CandlewickError> {
        let mut out = Vec::new();
        for &tf in &self.cfg.timeframes {
            let detector =
                GapDetector::new(&self.calendar).with_retention(self.effective_limits(tf).retention);
            for inst in self.registry.iter() {
                let bars = self.store.load(inst.key(), tf).await?;
                let health = detector.inspect(inst, tf, &bars, now);
                #[cfg(feature = "tracing")]
                if !health.is_healthy() && !health.is_empty() {
                    tracing::warn!(
                        instrument = %inst.key(),
                        timeframe = %tf,
                        gaps = health.gap_count,
                        duplicates = health.duplicates,
                        stale = health.stale.is_some(),
                        "series needs attention"
                    );
                }
                out.push(health);
            }
        }
        Ok(out)
    }

    /// Stored series at `timeframe` whose instrument is not registered.
    ///
    /// # Errors
    /// Returns the store error if the series cannot be listed.
    pub async fn orphaned_series(
        &self,
        timeframe: Timeframe,
    ) -> Result<Vec<InstrumentKey>, CandlewickError> {
        let mut keys = self.store.keys(timeframe).await?;
        keys.retain(|k| self.registry.get(k).is_none());
        Ok(keys)
    }
}
