//! Configuration types shared across the collector and its middleware.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CandlewickError, Timeframe};

/// Strategy for consuming units from a quota when handling requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum QuotaConsumptionStrategy {
    /// Each request deducts exactly one unit from the quota budget.
    #[default]
    Unit,
    /// Split the window into 24 slices and allow `limit / 24` calls per
    /// slice, so a long backfill cannot burn the whole budget at once.
    EvenSpreadHourly,
}

/// Configuration for a token-like quota budget over a fixed window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum number of units that may be consumed within a single window.
    pub limit: u64,
    /// Duration of the accounting window.
    pub window: Duration,
    /// Strategy for how requests consume units from the budget.
    pub strategy: QuotaConsumptionStrategy,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limit: 2_000,
            window: Duration::from_secs(3_600),
            strategy: QuotaConsumptionStrategy::Unit,
        }
    }
}

/// Jittered pause inserted between consecutive backfill fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelay {
    /// Base delay in milliseconds.
    pub base_ms: u64,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for ChunkDelay {
    fn default() -> Self {
        Self {
            base_ms: 250,
            jitter_percent: 20,
        }
    }
}

/// Global configuration for the collector driver and reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Root directory holding one sub-directory of series files per timeframe.
    pub data_dir: PathBuf,
    /// Location of the status record (instrument → timeframe → last update).
    pub status_path: PathBuf,
    /// Timeframes collected for every registered instrument.
    pub timeframes: Vec<Timeframe>,
    /// Width of the concurrency limiter: maximum simultaneous provider calls.
    pub max_in_flight: usize,
    /// Timeout for an individual provider request.
    pub provider_timeout: Duration,
    /// Sleep between driver ticks.
    pub tick_interval: Duration,
    /// Pause between consecutive backfill chunk fetches.
    pub chunk_delay: ChunkDelay,
    /// When set, an empty series is seeded with this much history instead
    /// of only the latest closed bar.
    pub bootstrap_history: Option<Duration>,
    /// Request budget applied to the provider, if any.
    pub quota: Option<QuotaConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            status_path: PathBuf::from("data/status.json"),
            timeframes: vec![
                Timeframe::M1,
                Timeframe::M5,
                Timeframe::M15,
                Timeframe::H1,
                Timeframe::H4,
                Timeframe::D1,
            ],
            max_in_flight: 20,
            provider_timeout: Duration::from_secs(30),
            tick_interval: Duration::from_secs(10),
            chunk_delay: ChunkDelay::default(),
            bootstrap_history: None,
            quota: None,
        }
    }
}

impl CollectorConfig {
    /// Parse a configuration document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `CandlewickError::Config` if the JSON is malformed or the
    /// resulting configuration is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, CandlewickError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| CandlewickError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    /// Returns `CandlewickError::Persistence` if the file cannot be read and
    /// `CandlewickError::Config` if its contents are invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CandlewickError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CandlewickError::persistence(path, e))?;
        Self::from_json(&raw)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `CandlewickError::Config` describing the first violation.
    pub fn validate(&self) -> Result<(), CandlewickError> {
        if self.max_in_flight == 0 {
            return Err(CandlewickError::Config(
                "max_in_flight must be at least 1".into(),
            ));
        }
        if self.timeframes.is_empty() {
            return Err(CandlewickError::Config(
                "at least one timeframe must be collected".into(),
            ));
        }
        if self.chunk_delay.jitter_percent > 100 {
            return Err(CandlewickError::Config(
                "chunk_delay.jitter_percent must be within 0..=100".into(),
            ));
        }
        if self.quota.as_ref().is_some_and(|q| q.limit == 0 || q.window.is_zero()) {
            return Err(CandlewickError::Config(
                "quota limit and window must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
