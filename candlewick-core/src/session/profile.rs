use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::ClosedWindow;

/// A closure that recurs every week, e.g. Friday 22:00 to Sunday 22:00.
///
/// Times are wall-clock times in the owning profile's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyClosure {
    /// Weekday the closure begins.
    pub from_weekday: Weekday,
    /// Local time the closure begins.
    #[serde(with = "hhmm")]
    pub from_time: NaiveTime,
    /// Weekday trading resumes.
    pub to_weekday: Weekday,
    /// Local time trading resumes.
    #[serde(with = "hhmm")]
    pub to_time: NaiveTime,
}

impl WeeklyClosure {
    /// Build a closure from weekday/time pairs.
    #[must_use]
    pub const fn new(
        from_weekday: Weekday,
        from_time: NaiveTime,
        to_weekday: Weekday,
        to_time: NaiveTime,
    ) -> Self {
        Self {
            from_weekday,
            from_time,
            to_weekday,
            to_time,
        }
    }

    fn day_span(&self) -> i64 {
        let span = (i64::from(self.to_weekday.num_days_from_monday())
            - i64::from(self.from_weekday.num_days_from_monday()))
        .rem_euclid(7);
        if span == 0 && self.to_time <= self.from_time {
            7
        } else {
            span
        }
    }

    /// The occurrence whose start is the latest one at or before `at`.
    #[must_use]
    pub fn occurrence_at_or_before(&self, tz: Tz, at: DateTime<Utc>) -> Option<ClosedWindow> {
        let local = at.with_timezone(&tz);
        let days_back = (i64::from(local.weekday().num_days_from_monday())
            - i64::from(self.from_weekday.num_days_from_monday()))
        .rem_euclid(7);
        let mut start_date = local.date_naive() - TimeDelta::days(days_back);
        let mut start = resolve_local(tz, start_date.and_time(self.from_time))?;
        if start > at {
            start_date -= TimeDelta::days(7);
            start = resolve_local(tz, start_date.and_time(self.from_time))?;
        }
        let end_date = start_date + TimeDelta::days(self.day_span());
        let end = resolve_local(tz, end_date.and_time(self.to_time))?;
        Some(ClosedWindow { start, end })
    }
}

/// A daily maintenance break. `end` earlier than `start` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBreak {
    /// Local time the break begins.
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    /// Local time trading resumes.
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl DailyBreak {
    /// Build a break from local start/end times.
    #[must_use]
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// True when the break crosses midnight.
    #[must_use]
    pub fn wraps(&self) -> bool {
        self.end < self.start
    }

    /// Length of the break in whole minutes.
    #[must_use]
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().rem_euclid(1_440)
    }

    /// The break beginning on local date `day`.
    #[must_use]
    pub fn occurrence_on(&self, tz: Tz, day: NaiveDate) -> Option<ClosedWindow> {
        let end_day = if self.wraps() {
            day.succ_opt()?
        } else {
            day
        };
        Some(ClosedWindow {
            start: resolve_local(tz, day.and_time(self.start))?,
            end: resolve_local(tz, end_day.and_time(self.end))?,
        })
    }
}

/// Trading schedule of a venue, expressed as declarative closures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    /// Timezone the weekday/time pairs are expressed in.
    pub tz: Tz,
    /// Recurring weekend closure, if any.
    #[serde(default)]
    pub weekly: Option<WeeklyClosure>,
    /// Daily maintenance breaks in order of their start time.
    #[serde(default)]
    pub breaks: Vec<DailyBreak>,
    /// Crypto-like venues never close.
    #[serde(default)]
    pub always_open: bool,
}

impl SessionProfile {
    /// A profile with no closures in the given timezone.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self {
            tz,
            weekly: None,
            breaks: Vec::new(),
            always_open: false,
        }
    }

    /// A profile that is never closed.
    #[must_use]
    pub const fn always_open() -> Self {
        Self {
            tz: Tz::UTC,
            weekly: None,
            breaks: Vec::new(),
            always_open: true,
        }
    }

    /// Set the weekly closure.
    #[must_use]
    pub const fn with_weekly(mut self, weekly: WeeklyClosure) -> Self {
        self.weekly = Some(weekly);
        self
    }

    /// Append a daily break, keeping breaks ordered by start time.
    #[must_use]
    pub fn with_break(mut self, brk: DailyBreak) -> Self {
        self.breaks.push(brk);
        self.breaks.sort_by_key(|b| b.start);
        self
    }
}

/// Map a local wall-clock time to UTC.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Nonexistent
/// times (DST spring-forward) are read one hour later on the wall clock.
pub(crate) fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => {
            let shifted = naive + TimeDelta::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                    Some(dt.with_timezone(&Utc))
                }
                LocalResult::None => None,
            }
        }
    }
}

/// `HH:MM` (or `HH:MM:SS`) serde representation for local times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(de::Error::custom)
    }
}
