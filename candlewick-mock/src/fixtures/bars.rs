use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use rust_decimal::Decimal;

use candlewick_core::{Bar, Timeframe};

/// A bar priced from its timestamp, so repeated fetches agree exactly.
#[must_use]
pub fn bar(ts: DateTime<Utc>) -> Bar {
    let m = ts.timestamp().div_euclid(60);
    let mid = 10_850 + m.rem_euclid(97);
    let drift = m.rem_euclid(7) - 3;
    let open = Decimal::new(mid, 4);
    let close = Decimal::new(mid + drift, 4);
    Bar::new(
        ts,
        open,
        open.max(close) + Decimal::new(5, 4),
        open.min(close) - Decimal::new(5, 4),
        close,
        u64::try_from(m.rem_euclid(1_000)).unwrap_or(0),
    )
}

/// A bar with all four prices equal to `px` ten-thousandths.
#[must_use]
pub fn flat(ts: DateTime<Utc>, px: i64) -> Bar {
    let p = Decimal::new(px, 4);
    Bar::new(ts, p, p, p, p, 0)
}

/// `n` consecutive synthetic bars starting at `start`.
#[must_use]
pub fn series(timeframe: Timeframe, start: DateTime<Utc>, n: usize) -> Vec<Bar> {
    let mut out = Vec::with_capacity(n);
    let mut ts = start;
    for _ in 0..n {
        out.push(bar(ts));
        ts = next_slot(timeframe, ts);
    }
    out
}

/// One synthetic bar per grid slot of `timeframe` in `[start, end)`.
///
/// Intraday and daily slots are aligned to the Unix epoch, weeks start on
/// Monday, months and quarters on their first day (all UTC).
#[must_use]
pub fn synthetic(timeframe: Timeframe, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Bar> {
    let mut out = Vec::new();
    let mut ts = first_slot(timeframe, start);
    while ts < end {
        out.push(bar(ts));
        ts = next_slot(timeframe, ts);
    }
    out
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn month_start(year: i32, month0: u32) -> Option<DateTime<Utc>> {
    let year = year + i32::try_from(month0 / 12).ok()?;
    NaiveDate::from_ymd_opt(year, month0 % 12 + 1, 1).map(midnight)
}

fn first_slot(timeframe: Timeframe, start: DateTime<Utc>) -> DateTime<Utc> {
    let date = start.date_naive();
    let floor = match timeframe {
        Timeframe::W1 => {
            Some(midnight(date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()))))
        }
        Timeframe::Mo1 => month_start(date.year(), date.month0()),
        Timeframe::Mo3 => month_start(date.year(), date.month0() - date.month0() % 3),
        _ => {
            let step = timeframe.minutes() * 60;
            DateTime::from_timestamp(start.timestamp() - start.timestamp().rem_euclid(step), 0)
        }
    }
    .unwrap_or(start);
    if floor < start {
        next_slot(timeframe, floor)
    } else {
        floor
    }
}

fn next_slot(timeframe: Timeframe, ts: DateTime<Utc>) -> DateTime<Utc> {
    let date = ts.date_naive();
    let next = match timeframe {
        Timeframe::Mo1 => month_start(date.year(), date.month0() + 1),
        Timeframe::Mo3 => month_start(date.year(), date.month0() + 3),
        _ => None,
    };
    next.unwrap_or_else(|| ts + timeframe.nominal())
}
