use chrono::NaiveDate;

use candlewick_core::{Currency, HolidayCalendar, SessionCalendar};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn code(c: &str) -> Currency {
    Currency::new(c).unwrap()
}

/// Year-end holidays for USD and EUR, 2024/25.
#[must_use]
pub fn holidays() -> HolidayCalendar {
    HolidayCalendar::new()
        .with_dates(code("USD"), [date(2024, 12, 25), date(2025, 1, 1)])
        .with_dates(code("EUR"), [date(2024, 12, 25), date(2024, 12, 26), date(2025, 1, 1)])
}

/// The built-in session profiles plus [`holidays`].
#[must_use]
pub fn calendar() -> SessionCalendar {
    SessionCalendar::standard().with_holidays(holidays())
}
