//! Bars, currencies, and provider request types, plus re-exports from
//! `candlewick-types` so downstream crates can depend on `candlewick-core` only.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use candlewick_types::{
    CandlewickError, ChunkDelay, CollectorConfig, InstrumentKey, QuotaConfig,
    QuotaConsumptionStrategy, ReconcileOutcome, ReconciliationMarker, SeriesOutcome, TickReport,
    Timeframe,
};

/// One OHLCV record for a fixed time bucket, labelled by the bucket start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket start (UTC, minute resolution).
    pub ts: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// Highest traded price.
    pub high: Decimal,
    /// Lowest traded price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume. Zero is legitimate (FX pairs report none).
    pub volume: u64,
}

impl Bar {
    /// Construct a bar from its parts.
    #[must_use]
    pub const fn new(
        ts: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Structural validation applied on every write path.
    ///
    /// A bar is rejected when `high < low`, when either extreme is zero or
    /// negative, or when open/close fall outside `[low, high]`. Zero volume
    /// is accepted.
    ///
    /// # Errors
    /// Returns `CandlewickError::Data` describing the first violated rule.
    pub fn validate(&self) -> Result<(), CandlewickError> {
        if self.high < self.low {
            return Err(CandlewickError::Data(format!(
                "bar at {}: high {} below low {}",
                self.ts, self.high, self.low
            )));
        }
        if self.low <= Decimal::ZERO || self.high <= Decimal::ZERO {
            return Err(CandlewickError::Data(format!(
                "bar at {}: non-positive price extreme (low {}, high {})",
                self.ts, self.low, self.high
            )));
        }
        if !self.is_ohlc_consistent() {
            return Err(CandlewickError::Data(format!(
                "bar at {}: open {} / close {} outside [{}, {}]",
                self.ts, self.open, self.close, self.low, self.high
            )));
        }
        Ok(())
    }

    /// True when `low <= {open, close} <= high`.
    #[must_use]
    pub fn is_ohlc_consistent(&self) -> bool {
        let top = self.open.max(self.close).max(self.low);
        let bottom = self.open.min(self.close).min(self.high);
        self.high >= top && self.low <= bottom
    }

    /// True when any of the four prices is negative.
    #[must_use]
    pub fn has_negative_price(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .any(Decimal::is_sign_negative)
    }
}

/// ISO 4217 currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse a three-letter code, case-insensitively.
    ///
    /// # Errors
    /// Returns `CandlewickError::InvalidArg` if the code is not three ASCII letters.
    pub fn new(code: &str) -> Result<Self, CandlewickError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CandlewickError::InvalidArg(format!(
                "invalid currency code '{code}'"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// The upper-case code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = CandlewickError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

/// Broad asset class of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AssetClass {
    /// Currency pair.
    Forex,
    /// Precious or industrial metal future.
    Metal,
    /// Energy future.
    Energy,
    /// Equity index or index future.
    Index,
    /// Single equity or ETF.
    Equity,
    /// Crypto asset.
    Crypto,
}

/// Per-timeframe limits enforced by an external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderLimits {
    /// Maximum bars the source returns for a single request.
    pub max_bars_per_request: usize,
    /// How far back the source keeps history at this timeframe, if limited.
    pub retention: Option<TimeDelta>,
}

impl ProviderLimits {
    /// Limits with no retention horizon.
    #[must_use]
    pub const fn unbounded(max_bars_per_request: usize) -> Self {
        Self {
            max_bars_per_request,
            retention: None,
        }
    }

    /// Oldest instant the source can still serve, relative to `now`.
    #[must_use]
    pub fn horizon(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.retention.and_then(|r| now.checked_sub_signed(r))
    }
}

/// Which bars to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSpan {
    /// Half-open window `[start, end)`.
    Window {
        /// Inclusive start.
        start: DateTime<Utc>,
        /// Exclusive end.
        end: DateTime<Utc>,
    },
    /// Everything in the trailing period ending now.
    Lookback(TimeDelta),
}

/// A single request to a [`BarProvider`](crate::connector::BarProvider).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Timeframe of the requested bars.
    pub timeframe: Timeframe,
    /// Window or trailing period.
    pub span: FetchSpan,
}

impl FetchRequest {
    /// Request the half-open window `[start, end)`.
    #[must_use]
    pub const fn window(timeframe: Timeframe, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            timeframe,
            span: FetchSpan::Window { start, end },
        }
    }

    /// Request the trailing `period`.
    #[must_use]
    pub const fn lookback(timeframe: Timeframe, period: TimeDelta) -> Self {
        Self {
            timeframe,
            span: FetchSpan::Lookback(period),
        }
    }
}
