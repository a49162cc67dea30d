//! Bar timeframes and their nominal widths.

use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::CandlewickError;

/// Nominal bucket width of a bar series.
///
/// Labels follow the collector's on-disk naming (`1m`, `4h`, `1W`, `1Mo`,
/// `3Mo`). Monthly and quarterly widths are nominal (30 and 90 days) and only
/// used for slack and missing-bar arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Timeframe {
    /// One minute.
    #[serde(rename = "1m")]
    M1,
    /// Five minutes.
    #[serde(rename = "5m")]
    M5,
    /// Fifteen minutes.
    #[serde(rename = "15m")]
    M15,
    /// One hour.
    #[serde(rename = "1h")]
    H1,
    /// Four hours, resampled from hourly bars when the provider lacks it.
    #[serde(rename = "4h")]
    H4,
    /// One day.
    #[serde(rename = "1d")]
    D1,
    /// One week.
    #[serde(rename = "1W")]
    W1,
    /// One month (nominal 30 days).
    #[serde(rename = "1Mo")]
    Mo1,
    /// One quarter (nominal 90 days).
    #[serde(rename = "3Mo")]
    Mo3,
}

impl Timeframe {
    /// Every timeframe, finest first.
    pub const ALL: [Self; 9] = [
        Self::M1,
        Self::M5,
        Self::M15,
        Self::H1,
        Self::H4,
        Self::D1,
        Self::W1,
        Self::Mo1,
        Self::Mo3,
    ];

    /// Nominal width in minutes.
    #[must_use]
    pub const fn minutes(self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1_440,
            Self::W1 => 10_080,
            Self::Mo1 => 43_200,
            Self::Mo3 => 129_600,
        }
    }

    /// Nominal width as a duration.
    #[must_use]
    pub const fn nominal(self) -> TimeDelta {
        TimeDelta::minutes(self.minutes())
    }

    /// Stable label used for file names and the status record.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::W1 => "1W",
            Self::Mo1 => "1Mo",
            Self::Mo3 => "3Mo",
        }
    }

    /// True for widths below one day.
    #[must_use]
    pub const fn is_intraday(self) -> bool {
        self.minutes() < 1_440
    }

    /// The finest timeframe that evenly divides this one, excluding itself.
    ///
    /// Used to synthesize a timeframe the provider cannot serve natively.
    #[must_use]
    pub const fn resample_source(self) -> Option<Self> {
        match self {
            Self::H4 => Some(Self::H1),
            Self::H1 => Some(Self::M15),
            Self::M15 => Some(Self::M5),
            Self::M5 => Some(Self::M1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = CandlewickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.label() == s)
            .ok_or_else(|| CandlewickError::InvalidArg(format!("unknown timeframe '{s}'")))
    }
}
