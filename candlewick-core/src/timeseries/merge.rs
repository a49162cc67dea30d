use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::CandlewickError;
use crate::types::Bar;

/// Result of merging incoming bars into a stored series.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// The merged series: strictly ascending, unique timestamps.
    pub bars: Vec<Bar>,
    /// Incoming bars that were new or replaced a different stored record.
    pub changed: usize,
    /// Bars dropped by structural validation, stored or incoming.
    pub rejected: Vec<CandlewickError>,
}

/// Truncate a timestamp to whole minutes.
#[must_use]
pub fn normalize_ts(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Merge `incoming` into `existing`.
///
/// - Timestamps are truncated to the minute.
/// - Bars failing [`Bar::validate`] are dropped from both sides and reported.
/// - On duplicate timestamps the later-arriving record wins: incoming over
///   stored, and later over earlier within each side.
/// - Output is sorted ascending.
///
/// Merging the same input twice yields the same series with `changed == 0`
/// on the second pass.
#[must_use]
pub fn merge_bars(existing: Vec<Bar>, incoming: Vec<Bar>) -> MergeOutcome {
    let mut by_ts: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    let mut rejected = Vec::new();

    for mut bar in existing {
        bar.ts = normalize_ts(bar.ts);
        match bar.validate() {
            Ok(()) => {
                by_ts.insert(bar.ts, bar);
            }
            Err(e) => rejected.push(e),
        }
    }

    let mut changed = 0;
    for mut bar in incoming {
        bar.ts = normalize_ts(bar.ts);
        if let Err(e) = bar.validate() {
            rejected.push(e);
            continue;
        }
        match by_ts.entry(bar.ts) {
            Entry::Vacant(v) => {
                v.insert(bar);
                changed += 1;
            }
            Entry::Occupied(mut o) => {
                if *o.get() != bar {
                    o.insert(bar);
                    changed += 1;
                }
            }
        }
    }

    MergeOutcome {
        bars: by_ts.into_values().collect(),
        changed,
        rejected,
    }
}

/// Split bars into those passing [`Bar::validate`] and the validation errors
/// of the rest.
#[must_use]
pub fn sanitize(bars: Vec<Bar>) -> (Vec<Bar>, Vec<CandlewickError>) {
    let mut kept = Vec::with_capacity(bars.len());
    let mut rejected = Vec::new();
    for bar in bars {
        match bar.validate() {
            Ok(()) => kept.push(bar),
            Err(e) => rejected.push(e),
        }
    }
    (kept, rejected)
}
