use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::CandlewickError;
use crate::types::Currency;

/// Per-currency market holidays.
///
/// Loaded once at startup and shared read-only. An instrument's effective
/// holidays are the union over its currency exposure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolidayCalendar {
    by_currency: HashMap<Currency, BTreeSet<NaiveDate>>,
}

impl HolidayCalendar {
    /// An empty calendar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"USD": ["2024-12-25", ...], ...}`.
    ///
    /// # Errors
    /// Returns `CandlewickError::Config` for malformed JSON, currency codes,
    /// or dates.
    pub fn from_json(json: &str) -> Result<Self, CandlewickError> {
        serde_json::from_str(json).map_err(|e| CandlewickError::Config(e.to_string()))
    }

    /// Add dates for a currency.
    #[must_use]
    pub fn with_dates(
        mut self,
        currency: Currency,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        self.by_currency.entry(currency).or_default().extend(dates);
        self
    }

    /// True if `date` is a holiday for `currency`.
    #[must_use]
    pub fn is_holiday(&self, currency: &Currency, date: NaiveDate) -> bool {
        self.by_currency
            .get(currency)
            .is_some_and(|dates| dates.contains(&date))
    }

    /// First holiday of any listed currency strictly between `after` and
    /// `before`.
    #[must_use]
    pub fn first_between(
        &self,
        currencies: &[Currency],
        after: NaiveDate,
        before: NaiveDate,
    ) -> Option<NaiveDate> {
        if after >= before {
            return None;
        }
        currencies
            .iter()
            .filter_map(|c| self.by_currency.get(c))
            .filter_map(|dates| {
                dates
                    .range((Bound::Excluded(after), Bound::Excluded(before)))
                    .next()
                    .copied()
            })
            .min()
    }

    /// Number of currencies with at least one date.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_currency.values().filter(|d| !d.is_empty()).count()
    }

    /// True when no currency has any date.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
