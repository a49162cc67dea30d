//! Session calendar model and the closed-window classifier.
//!
//! Closures are declarative data: a weekly closure per profile, daily
//! maintenance breaks, and per-currency holiday dates. The classifier asks
//! whether a single one of those windows covers a queried interval.

mod calendar;
mod holidays;
mod profile;

pub use calendar::SessionCalendar;
pub use holidays::HolidayCalendar;
pub use profile::{DailyBreak, SessionProfile, WeeklyClosure};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// A concrete closure occurrence, half-open `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedWindow {
    /// First closed instant.
    pub start: DateTime<Utc>,
    /// First instant trading resumes.
    pub end: DateTime<Utc>,
}

impl ClosedWindow {
    /// True when `[start, end)` lies entirely inside this window.
    #[must_use]
    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= start && end <= self.end
    }
}

/// Why an interval was classified closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Closure {
    /// The profile's weekly closure.
    Weekly(ClosedWindow),
    /// A daily maintenance break.
    Break(ClosedWindow),
    /// A holiday of one of the instrument's currencies.
    Holiday(NaiveDate),
    /// The FX weekend applied to two-currency instruments without a profile.
    FxWeekend(ClosedWindow),
}

/// Names of the built-in profiles.
pub mod profiles {
    /// Spot FX: Friday 22:00 to Sunday 22:00 UTC, 05:00-06:00 UTC break.
    pub const FX: &str = "fx";
    /// CME Globex futures in Chicago time.
    pub const CME: &str = "cme";
    /// US cash equities in New York time.
    pub const US_EQUITY: &str = "us-equity";
    /// Never closed.
    pub const CRYPTO: &str = "crypto";
}

const fn hm(h: u32, m: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(h, m, 0) {
        Some(t) => t,
        None => NaiveTime::MIN,
    }
}

impl SessionCalendar {
    /// The profiles used by the default instrument universe, with no holidays.
    #[must_use]
    pub fn standard() -> Self {
        let fx = SessionProfile::new(chrono_tz::UTC)
            .with_weekly(WeeklyClosure::new(Weekday::Fri, hm(22, 0), Weekday::Sun, hm(22, 0)))
            .with_break(DailyBreak::new(hm(5, 0), hm(6, 0)));
        let cme = SessionProfile::new(chrono_tz::America::Chicago)
            .with_weekly(WeeklyClosure::new(Weekday::Fri, hm(16, 0), Weekday::Sun, hm(17, 0)))
            .with_break(DailyBreak::new(hm(16, 0), hm(17, 0)));
        let us_equity = SessionProfile::new(chrono_tz::America::New_York)
            .with_weekly(WeeklyClosure::new(Weekday::Fri, hm(16, 0), Weekday::Mon, hm(9, 30)))
            .with_break(DailyBreak::new(hm(16, 0), hm(9, 30)));

        Self::new()
            .with_profile(profiles::FX, fx)
            .with_profile(profiles::CME, cme)
            .with_profile(profiles::US_EQUITY, us_equity)
            .with_profile(profiles::CRYPTO, SessionProfile::always_open())
    }
}
