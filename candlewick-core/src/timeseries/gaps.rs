use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::instrument::Instrument;
use crate::session::SessionCalendar;
use crate::types::Bar;
use crate::{InstrumentKey, Timeframe};

/// Gaps of this length or more are ignored; they are outages or delistings
/// rather than something a backfill should chase.
const GAP_CEILING: TimeDelta = TimeDelta::days(3);
/// Number of gaps listed individually in a report.
const REPORTED_GAPS: usize = 5;

/// Age beyond which a series tail counts as stale, per timeframe.
#[must_use]
pub const fn staleness_threshold(timeframe: Timeframe) -> Option<TimeDelta> {
    match timeframe {
        Timeframe::M1 => Some(TimeDelta::hours(1)),
        Timeframe::M5 | Timeframe::M15 => Some(TimeDelta::hours(2)),
        Timeframe::H1 => Some(TimeDelta::hours(6)),
        Timeframe::H4 => Some(TimeDelta::hours(12)),
        Timeframe::D1 => Some(TimeDelta::days(2)),
        _ => None,
    }
}

/// Largest spacing between consecutive bars that is not a gap.
#[must_use]
pub const fn allowed_slack(timeframe: Timeframe) -> TimeDelta {
    match timeframe {
        Timeframe::M1 => TimeDelta::minutes(2),
        other => other.nominal(),
    }
}

/// A run of missing bars between two stored bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Last bar before the gap.
    pub after: DateTime<Utc>,
    /// First bar after the gap.
    pub before: DateTime<Utc>,
    /// Bars expected between the two.
    pub missing: i64,
}

/// The tail of a series is older than its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staleness {
    /// Timestamp of the newest bar.
    pub last: DateTime<Utc>,
    /// Age of the newest bar, in minutes.
    pub age_minutes: i64,
    /// Threshold it exceeded, in minutes.
    pub threshold_minutes: i64,
}

/// Health of one stored series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesHealth {
    /// Instrument inspected.
    pub instrument: InstrumentKey,
    /// Timeframe inspected.
    pub timeframe: Timeframe,
    /// Rows in the series as stored.
    pub bar_count: usize,
    /// Earliest timestamp.
    pub first: Option<DateTime<Utc>>,
    /// Latest timestamp.
    pub last: Option<DateTime<Utc>>,
    /// The first few unexplained gaps.
    pub gaps: Vec<Gap>,
    /// Total unexplained gaps.
    pub gap_count: usize,
    /// Rows sharing a timestamp with an earlier row.
    pub duplicates: usize,
    /// Rows with `high < max(open, close, low)` or `low > min(open, close, high)`.
    pub inconsistent_ohlc: usize,
    /// Rows with any negative price.
    pub negative_prices: usize,
    /// Set when the tail is older than the timeframe's threshold.
    pub stale: Option<Staleness>,
}

impl SeriesHealth {
    /// True when the series is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bar_count == 0
    }

    /// True when nothing was reported.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.bar_count > 0
            && self.gap_count == 0
            && self.duplicates == 0
            && self.inconsistent_ohlc == 0
            && self.negative_prices == 0
            && self.stale.is_none()
    }
}

/// Scans stored series for gaps, staleness, and malformed rows, net of
/// scheduled closures.
#[derive(Debug, Clone, Copy)]
pub struct GapDetector<'a> {
    calendar: &'a SessionCalendar,
    retention: Option<TimeDelta>,
}

impl<'a> GapDetector<'a> {
    /// A detector classifying closures with `calendar`.
    #[must_use]
    pub const fn new(calendar: &'a SessionCalendar) -> Self {
        Self {
            calendar,
            retention: None,
        }
    }

    /// Ignore gaps that end before `now - retention`; the source cannot fill
    /// them anymore.
    #[must_use]
    pub const fn with_retention(mut self, retention: Option<TimeDelta>) -> Self {
        self.retention = retention;
        self
    }

    /// Inspect `bars` (in stored order) as of `now`.
    #[must_use]
    pub fn inspect(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        bars: &[Bar],
        now: DateTime<Utc>,
    ) -> SeriesHealth {
        let mut health = SeriesHealth {
            instrument: instrument.key().clone(),
            timeframe,
            bar_count: bars.len(),
            first: None,
            last: None,
            gaps: Vec::new(),
            gap_count: 0,
            duplicates: 0,
            inconsistent_ohlc: 0,
            negative_prices: 0,
            stale: None,
        };

        let mut seen = HashSet::with_capacity(bars.len());
        for bar in bars {
            if !seen.insert(bar.ts) {
                health.duplicates += 1;
            }
            if !bar.is_ohlc_consistent() {
                health.inconsistent_ohlc += 1;
            }
            if bar.has_negative_price() {
                health.negative_prices += 1;
            }
        }

        let mut stamps: Vec<DateTime<Utc>> = seen.into_iter().collect();
        stamps.sort_unstable();
        let (Some(&first), Some(&last)) = (stamps.first(), stamps.last()) else {
            return health;
        };
        health.first = Some(first);
        health.last = Some(last);

        let slack = allowed_slack(timeframe);
        let horizon = self.retention.and_then(|r| now.checked_sub_signed(r));
        for pair in stamps.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let delta = next - prev;
            if delta <= slack || delta >= GAP_CEILING {
                continue;
            }
            if horizon.is_some_and(|h| next <= h) {
                continue;
            }
            if self
                .calendar
                .explain_gap(instrument, prev, next, timeframe)
                .is_some()
            {
                continue;
            }
            health.gap_count += 1;
            if health.gaps.len() < REPORTED_GAPS {
                health.gaps.push(Gap {
                    after: prev,
                    before: next,
                    missing: delta.num_minutes() / timeframe.minutes() - 1,
                });
            }
        }

        if let Some(threshold) = staleness_threshold(timeframe) {
            let age = now - last;
            if age > threshold
                && self
                    .calendar
                    .explain_gap(instrument, last, now, timeframe)
                    .is_none()
            {
                health.stale = Some(Staleness {
                    last,
                    age_minutes: age.num_minutes(),
                    threshold_minutes: threshold.num_minutes(),
                });
            }
        }

        health
    }
}
