use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::{ClosedWindow, Closure, HolidayCalendar, SessionProfile};
use crate::instrument::Instrument;
use crate::{CandlewickError, Timeframe};

/// Session profiles by name plus the shared holiday calendar.
///
/// This is the whole input of the closed-window classifier besides the
/// instrument and the queried interval, so a calendar built from fixed data
/// classifies identically on every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCalendar {
    #[serde(default)]
    profiles: HashMap<String, SessionProfile>,
    #[serde(default)]
    holidays: HolidayCalendar,
}

impl SessionCalendar {
    /// A calendar with no profiles and no holidays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a named profile.
    #[must_use]
    pub fn with_profile(mut self, name: impl Into<String>, profile: SessionProfile) -> Self {
        self.profiles.insert(name.into(), profile);
        self
    }

    /// Replace the holiday calendar.
    #[must_use]
    pub fn with_holidays(mut self, holidays: HolidayCalendar) -> Self {
        self.holidays = holidays;
        self
    }

    /// Parse a calendar document: `{"profiles": {...}, "holidays": {...}}`.
    ///
    /// # Errors
    /// Returns `CandlewickError::Config` when the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, CandlewickError> {
        serde_json::from_str(json).map_err(|e| CandlewickError::Config(e.to_string()))
    }

    /// Look up a profile by name.
    #[must_use]
    pub fn profile(&self, name: &str) -> Option<&SessionProfile> {
        self.profiles.get(name)
    }

    /// The shared holiday calendar.
    #[must_use]
    pub const fn holidays(&self) -> &HolidayCalendar {
        &self.holidays
    }

    /// True iff `[start, end)` is fully explained by scheduled unavailability.
    ///
    /// Inputs in any timezone are normalized to UTC first, so the same
    /// instants give the same answer whatever zone they are expressed in.
    #[must_use]
    pub fn is_closed<A: TimeZone, B: TimeZone>(
        &self,
        instrument: &Instrument,
        start: &DateTime<A>,
        end: &DateTime<B>,
        timeframe: Timeframe,
    ) -> bool {
        self.explain(
            instrument,
            start.with_timezone(&Utc),
            end.with_timezone(&Utc),
            timeframe,
        )
        .is_some()
    }

    /// [`is_closed`](Self::is_closed) for bare timestamps, which are taken as UTC.
    #[must_use]
    pub fn is_closed_naive(
        &self,
        instrument: &Instrument,
        start: NaiveDateTime,
        end: NaiveDateTime,
        timeframe: Timeframe,
    ) -> bool {
        self.explain(instrument, start.and_utc(), end.and_utc(), timeframe)
            .is_some()
    }

    /// The single closure that covers `[start, end)`, if any.
    ///
    /// Each candidate window is tested on its own; an interval spanning two
    /// adjacent closures (a holiday next to a weekend) is not attributed.
    #[must_use]
    pub fn explain(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Option<Closure> {
        self.classify(instrument, start, end, start.date_naive(), timeframe)
    }

    /// The closure explaining why no bar exists between the stored bar at
    /// `last` and the next stored bar (or the present) at `next`.
    ///
    /// Recurring windows must contain `[last + nominal, next)`. Holidays are
    /// looked up on the dates strictly between the dates of `last` and
    /// `next`, so a feed that stops at the end of the day before a holiday
    /// and resumes at the start of the day after it is explained.
    #[must_use]
    pub fn explain_gap(
        &self,
        instrument: &Instrument,
        last: DateTime<Utc>,
        next: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Option<Closure> {
        self.classify(
            instrument,
            last + timeframe.nominal(),
            next,
            last.date_naive(),
            timeframe,
        )
    }

    fn classify(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        holidays_after: NaiveDate,
        timeframe: Timeframe,
    ) -> Option<Closure> {
        if start >= end {
            return None;
        }

        let profile = instrument.session().and_then(|name| self.profiles.get(name));
        match profile {
            Some(p) if p.always_open => return None,
            None if !instrument.is_fx_like() => return None,
            _ => {}
        }

        if let Some(p) = profile {
            if let Some(w) = p.weekly.as_ref().and_then(|w| w.occurrence_at_or_before(p.tz, start))
                && w.contains(start, end)
            {
                return Some(Closure::Weekly(w));
            }

            let local_day = start.with_timezone(&p.tz).date_naive();
            for brk in &p.breaks {
                if timeframe.minutes() > brk.minutes() {
                    continue;
                }
                let days = [local_day.pred_opt(), Some(local_day)];
                for day in days.into_iter().flatten() {
                    if let Some(w) = brk.occurrence_on(p.tz, day)
                        && w.contains(start, end)
                    {
                        return Some(Closure::Break(w));
                    }
                }
            }
        }

        if let Some(day) =
            self.holidays
                .first_between(instrument.currencies(), holidays_after, end.date_naive())
        {
            return Some(Closure::Holiday(day));
        }

        if profile.is_none()
            && let Some(w) = fx_weekend_at_or_before(start)
            && w.contains(start, end)
        {
            return Some(Closure::FxWeekend(w));
        }

        None
    }
}

/// Friday 22:00 UTC through Sunday 22:00 UTC, the occurrence starting at or
/// before `at`.
fn fx_weekend_at_or_before(at: DateTime<Utc>) -> Option<ClosedWindow> {
    let days_back = (i64::from(at.weekday().num_days_from_monday())
        - i64::from(Weekday::Fri.num_days_from_monday()))
    .rem_euclid(7);
    let friday: NaiveDate = at.date_naive() - TimeDelta::days(days_back);
    let mut start = friday.and_time(NaiveTime::from_hms_opt(22, 0, 0)?).and_utc();
    if start > at {
        start -= TimeDelta::days(7);
    }
    Some(ClosedWindow {
        start,
        end: start + TimeDelta::hours(48),
    })
}
